//! Field extraction from the scraped quote panel.
//!
//! The panel arrives as an ordered list of text blocks (one per panel
//! child). Extraction is versioned behind [`FieldExtractor`] so a page
//! layout change means a new extractor, not edits to every caller.

use thiserror::Error;

use crate::market::MarketSnapshot;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("quote panel: expected {expected} blocks, found {found}")]
    BlockCount { expected: usize, found: usize },

    #[error("{name} block: expected {expected} lines, found {found} in {text:?}")]
    LineCount {
        name: &'static str,
        expected: usize,
        found: usize,
        text: String,
    },

    #[error("{field}: not a number: {value:?}")]
    Numeric { field: &'static str, value: String },

    #[error("malformed position text: {0:?}")]
    Position(String),
}

/// Ordered text blocks scraped from one panel. Blocks hold raw inner text,
/// lines separated by `\n`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockDocument {
    blocks: Vec<String>,
}

impl BlockDocument {
    pub fn new(blocks: Vec<String>) -> Self {
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, index: usize) -> Option<&str> {
        self.blocks.get(index).map(|s| s.as_str())
    }
}

pub trait FieldExtractor {
    /// Stable identifier of the page layout this extractor understands.
    fn version(&self) -> &'static str;

    fn extract(&self, doc: &BlockDocument) -> Result<MarketSnapshot, ExtractError>;
}

/// Extractor for the five-block quote panel layout:
/// contract header, LAST, BID, ASK, POSITION.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotePanelExtractor;

const PANEL_BLOCKS: usize = 5;

impl FieldExtractor for QuotePanelExtractor {
    fn version(&self) -> &'static str {
        "quote-panel/v1"
    }

    fn extract(&self, doc: &BlockDocument) -> Result<MarketSnapshot, ExtractError> {
        if doc.len() < PANEL_BLOCKS {
            return Err(ExtractError::BlockCount {
                expected: PANEL_BLOCKS,
                found: doc.len(),
            });
        }

        let header = block_lines(doc, 0, "contract", 2)?;
        let last = block_lines(doc, 1, "LAST", 3)?;
        let bid = block_lines(doc, 2, "BID", 3)?;
        let ask = block_lines(doc, 3, "ASK", 3)?;
        let position = block_lines(doc, 4, "POSITION", 3)?;

        let (contract_volume, cost_price) = parse_position(position[1])?;

        Ok(MarketSnapshot {
            future_code: header[0].to_string(),
            future_series_name: header[1].to_string(),
            last_label: last[0].to_string(),
            last_price: parse_f64("last price", last[1])?,
            price_change: last[2].to_string(),
            bid_label: bid[0].to_string(),
            bid_price: parse_f64("bid price", bid[1])?,
            bid_volume: parse_i64("bid volume", bid[2])?,
            ask_label: ask[0].to_string(),
            ask_price: parse_f64("ask price", ask[1])?,
            ask_volume: parse_i64("ask volume", ask[2])?,
            position_label: position[0].to_string(),
            contract_volume,
            cost_price,
        })
    }
}

fn block_lines<'a>(
    doc: &'a BlockDocument,
    index: usize,
    name: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, ExtractError> {
    let text = doc.block(index).unwrap_or_default();
    let lines: Vec<&str> = text.split('\n').map(|l| l.trim()).collect();
    if lines.len() != expected {
        return Err(ExtractError::LineCount {
            name,
            expected,
            found: lines.len(),
            text: text.to_string(),
        });
    }
    Ok(lines)
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, ExtractError> {
    value.trim().parse().map_err(|_| ExtractError::Numeric {
        field,
        value: value.to_string(),
    })
}

fn parse_i64(field: &'static str, value: &str) -> Result<i64, ExtractError> {
    value.trim().parse().map_err(|_| ExtractError::Numeric {
        field,
        value: value.to_string(),
    })
}

/// Position cell: `"0"` when flat, otherwise `"<contracts>@<avg price>"`.
fn parse_position(text: &str) -> Result<(i64, f64), ExtractError> {
    let text = text.trim();
    if text == "0" {
        return Ok((0, 0.0));
    }
    let (volume, price) = text
        .split_once('@')
        .ok_or_else(|| ExtractError::Position(text.to_string()))?;
    let volume = volume
        .trim()
        .parse()
        .map_err(|_| ExtractError::Position(text.to_string()))?;
    let price = price
        .trim()
        .parse()
        .map_err(|_| ExtractError::Position(text.to_string()))?;
    Ok((volume, price))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_panel() -> BlockDocument {
        BlockDocument::new(vec![
            "MNQ\nMicro E-Mini Nasdaq-100 SEP25".to_string(),
            "LAST\n18350.75\n-12.25 (-0.07%)".to_string(),
            "BID\n18345.50\n2".to_string(),
            "ASK\n18351.00\n5".to_string(),
            "POSITION\n3@18200.25\n+451.50".to_string(),
        ])
    }

    #[test]
    fn test_extract_valid_panel() {
        let snapshot = QuotePanelExtractor.extract(&valid_panel()).unwrap();
        assert_eq!(snapshot.future_code, "MNQ");
        assert_eq!(snapshot.future_series_name, "Micro E-Mini Nasdaq-100 SEP25");
        assert_eq!(snapshot.last_label, "LAST");
        assert_eq!(snapshot.last_price, 18350.75);
        assert_eq!(snapshot.price_change, "-12.25 (-0.07%)");
        assert_eq!(snapshot.bid_label, "BID");
        assert_eq!(snapshot.bid_price, 18345.50);
        assert_eq!(snapshot.bid_volume, 2);
        assert_eq!(snapshot.ask_price, 18351.00);
        assert_eq!(snapshot.ask_volume, 5);
        assert_eq!(snapshot.position_label, "POSITION");
        assert_eq!(snapshot.contract_volume, 3);
        assert_eq!(snapshot.cost_price, 18200.25);
    }

    #[test]
    fn test_flat_position() {
        let mut blocks = valid_panel();
        blocks.blocks[4] = "POSITION\n0\n0.00".to_string();
        let snapshot = QuotePanelExtractor.extract(&blocks).unwrap();
        assert_eq!(snapshot.contract_volume, 0);
        assert_eq!(snapshot.cost_price, 0.0);
    }

    #[test]
    fn test_too_few_blocks() {
        let doc = BlockDocument::new(vec!["MNQ\nSEP25".to_string()]);
        let err = QuotePanelExtractor.extract(&doc).unwrap_err();
        assert_eq!(
            err,
            ExtractError::BlockCount {
                expected: 5,
                found: 1
            }
        );
    }

    #[test]
    fn test_short_block() {
        let mut doc = valid_panel();
        doc.blocks[2] = "BID\n18345.50".to_string();
        match QuotePanelExtractor.extract(&doc).unwrap_err() {
            ExtractError::LineCount { name, expected, found, .. } => {
                assert_eq!(name, "BID");
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_block_with_extra_lines() {
        let mut doc = valid_panel();
        doc.blocks[2] = "BID\n18345.50\n2\nextra".to_string();
        match QuotePanelExtractor.extract(&doc).unwrap_err() {
            ExtractError::LineCount { name, expected, found, .. } => {
                assert_eq!(name, "BID");
                assert_eq!(expected, 3);
                assert_eq!(found, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_price() {
        let mut doc = valid_panel();
        doc.blocks[1] = "LAST\n--\n0.00".to_string();
        match QuotePanelExtractor.extract(&doc).unwrap_err() {
            ExtractError::Numeric { field, value } => {
                assert_eq!(field, "last price");
                assert_eq!(value, "--");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_position() {
        let mut doc = valid_panel();
        doc.blocks[4] = "POSITION\nlong three\n0.00".to_string();
        assert_eq!(
            QuotePanelExtractor.extract(&doc).unwrap_err(),
            ExtractError::Position("long three".to_string())
        );
    }

    #[test]
    fn test_extractor_version() {
        assert_eq!(QuotePanelExtractor.version(), "quote-panel/v1");
    }
}
