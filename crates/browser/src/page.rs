//! Typed page operations over a CDP connection.
//!
//! Everything the trading console needs from the page goes through here:
//! navigation, lookup by selector / visible text / form label, clicking,
//! filling, file upload, screenshots. Fixed sleeps and bounded polls only;
//! an action that fails is reported, not retried.

use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

use tradepilot_core::{Error, Result};

use crate::cdp::CdpClient;

const POLL_INTERVAL_MS: u64 = 200;

pub struct Page<'a> {
    cdp: &'a CdpClient,
    default_timeout_ms: u64,
}

impl<'a> Page<'a> {
    pub fn new(cdp: &'a CdpClient, default_timeout_ms: u64) -> Self {
        Self {
            cdp,
            default_timeout_ms,
        }
    }

    // ─── Navigation ───────────────────────────────────────────────────

    /// Navigate and wait for the load event (readyState poll as fallback
    /// when the event does not arrive in time).
    pub async fn goto(&self, url: &str) -> Result<()> {
        let mut load_events = self.cdp.subscribe_event("Page.loadEventFired").await;
        self.cdp.navigate(url).await?;

        let wait = std::time::Duration::from_millis(self.default_timeout_ms);
        match tokio::time::timeout(wait, load_events.recv()).await {
            Ok(Some(_)) => Ok(()),
            _ => {
                debug!(url = url, "load event not seen, falling back to readyState");
                self.wait_for_ready_state().await
            }
        }
    }

    /// Wait until `document.readyState` is `complete`. Returns immediately
    /// on an already-loaded page.
    pub async fn wait_for_ready_state(&self) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(self.default_timeout_ms);
        loop {
            let result = self
                .cdp
                .evaluate_js("document.readyState === 'complete'")
                .await?;
            if js_value(&result).as_bool().unwrap_or(false) {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "page load after {}ms",
                    self.default_timeout_ms
                )));
            }
            tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    // ─── Lookup ───────────────────────────────────────────────────────

    pub async fn exists(&self, selector: &str) -> Result<bool> {
        let js = format!("!!document.querySelector('{}')", escape_js(selector));
        let result = self.cdp.evaluate_js(&js).await?;
        Ok(js_value(&result).as_bool().unwrap_or(false))
    }

    /// Poll until the selector matches, up to `timeout_ms`.
    pub async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);
        loop {
            if self.exists(selector).await? {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "waiting for '{}' after {}ms",
                    selector, timeout_ms
                )));
            }
            tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// Rendered text of the first element matching the selector.
    pub async fn inner_text(&self, selector: &str) -> Result<String> {
        let js = format!(
            "(function() {{ var el = document.querySelector('{}'); return el ? el.innerText : null; }})()",
            escape_js(selector)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        js_value(&result)
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::NotFound(format!("element '{}'", selector)))
    }

    /// Rendered text of each direct child of the matched container, in
    /// document order. This is how the quote panel is scraped: one child
    /// element per labeled block.
    pub async fn child_block_texts(&self, selector: &str) -> Result<Vec<String>> {
        let js = format!(
            concat!(
                "(function() {{ var panel = document.querySelector('{}');",
                " if (!panel) return null;",
                " var out = [];",
                " for (var i = 0; i < panel.children.length; i++) {{ out.push(panel.children[i].innerText); }}",
                " return out; }})()"
            ),
            escape_js(selector)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        let value = js_value(&result);
        let blocks = value
            .as_array()
            .ok_or_else(|| Error::NotFound(format!("element '{}'", selector)))?;
        Ok(blocks
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect())
    }

    // ─── Clicking ─────────────────────────────────────────────────────

    /// Click the first element matching the selector: box-model center via
    /// Input events, falling back to a JS click when no box is available
    /// (e.g. inline elements).
    pub async fn click_selector(&self, selector: &str) -> Result<()> {
        let root = self.document_root().await?;
        let node_ids = self.cdp.query_selector_all(root, selector).await?;
        let node_id = *node_ids
            .first()
            .ok_or_else(|| Error::NotFound(format!("element '{}'", selector)))?;

        let object_id = self.cdp.resolve_node(node_id).await?;

        let box_result = self
            .cdp
            .send_command("DOM.getBoxModel", json!({"nodeId": node_id}))
            .await;

        match box_result {
            Ok(bm) => {
                let (x, y) = extract_center_from_box_model(&bm);
                self.cdp
                    .dispatch_mouse_event("mousePressed", x, y, "left", 1)
                    .await?;
                self.cdp
                    .dispatch_mouse_event("mouseReleased", x, y, "left", 1)
                    .await?;
            }
            Err(_) => {
                self.cdp
                    .call_function_on(
                        &object_id,
                        "function() { this.scrollIntoView({block: 'center'}); this.click(); }",
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Click the element carrying the given visible text. Prefers a leaf
    /// element with exactly that text, then the innermost element whose
    /// text contains it.
    pub async fn click_by_text(&self, text: &str) -> Result<()> {
        let js = format!(
            concat!(
                "(function() {{ var needle = '{}';",
                " var els = document.querySelectorAll('body *');",
                " var best = null;",
                " for (var i = 0; i < els.length; i++) {{",
                "   var el = els[i];",
                "   if (el.children.length === 0 && el.textContent && el.textContent.trim() === needle) {{ best = el; break; }}",
                " }}",
                " if (!best) {{",
                "   for (var i = 0; i < els.length; i++) {{",
                "     var el = els[i];",
                "     if (el.textContent && el.textContent.indexOf(needle) !== -1) {{ best = el; }}",
                "   }}",
                " }}",
                " if (!best) return false;",
                " best.scrollIntoView({{block: 'center'}});",
                " best.click(); return true; }})()"
            ),
            escape_js(text)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        if !js_value(&result).as_bool().unwrap_or(false) {
            return Err(Error::NotFound(format!("element with text '{}'", text)));
        }
        Ok(())
    }

    /// Click the first descendant of `container` whose text contains
    /// `text`, polling up to `timeout_ms` for it to appear.
    pub async fn click_text_in(&self, container: &str, text: &str, timeout_ms: u64) -> Result<()> {
        let js = format!(
            concat!(
                "(function() {{ var root = document.querySelector('{}');",
                " if (!root) return false;",
                " var els = root.querySelectorAll('*');",
                " for (var i = 0; i < els.length; i++) {{",
                "   var el = els[i];",
                "   if (el.textContent && el.textContent.indexOf('{}') !== -1) {{",
                "     el.scrollIntoView({{block: 'center'}});",
                "     el.click(); return true;",
                "   }}",
                " }}",
                " return false; }})()"
            ),
            escape_js(container),
            escape_js(text)
        );

        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);
        loop {
            let result = self.cdp.evaluate_js(&js).await?;
            if js_value(&result).as_bool().unwrap_or(false) {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(Error::NotFound(format!(
                    "'{}' inside '{}' after {}ms",
                    text, container, timeout_ms
                )));
            }
            tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// Whether a button with the given accessible name is on the page.
    pub async fn button_exists(&self, name: &str) -> Result<bool> {
        let js = format!(
            concat!(
                "(function() {{ var needle = '{}';",
                " var els = document.querySelectorAll('button, [role=\"button\"], input[type=\"submit\"]');",
                " for (var i = 0; i < els.length; i++) {{",
                "   var el = els[i];",
                "   var label = (el.textContent || '').trim() || el.value || el.getAttribute('aria-label') || '';",
                "   if (label.indexOf(needle) !== -1) return true;",
                " }}",
                " return false; }})()"
            ),
            escape_js(name)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        Ok(js_value(&result).as_bool().unwrap_or(false))
    }

    /// Click a button by its accessible name (text content, value, or
    /// aria-label).
    pub async fn click_button_by_name(&self, name: &str) -> Result<()> {
        let js = format!(
            concat!(
                "(function() {{ var needle = '{}';",
                " var els = document.querySelectorAll('button, [role=\"button\"], input[type=\"submit\"]');",
                " for (var i = 0; i < els.length; i++) {{",
                "   var el = els[i];",
                "   var label = (el.textContent || '').trim() || el.value || el.getAttribute('aria-label') || '';",
                "   if (label.indexOf(needle) !== -1) {{",
                "     el.scrollIntoView({{block: 'center'}});",
                "     el.click(); return true;",
                "   }}",
                " }}",
                " return false; }})()"
            ),
            escape_js(name)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        if !js_value(&result).as_bool().unwrap_or(false) {
            return Err(Error::NotFound(format!("button '{}'", name)));
        }
        Ok(())
    }

    // ─── Forms ────────────────────────────────────────────────────────

    /// Choose a `<select>` option by its visible label and fire the
    /// change/input events frameworks listen for.
    pub async fn select_option_by_label(&self, selector: &str, label: &str) -> Result<()> {
        let js = format!(
            concat!(
                "(function() {{ var sel = document.querySelector('{}');",
                " if (!sel) return false;",
                " for (var i = 0; i < sel.options.length; i++) {{",
                "   if (sel.options[i].text.trim() === '{}') {{",
                "     sel.value = sel.options[i].value;",
                "     sel.dispatchEvent(new Event('input', {{bubbles: true}}));",
                "     sel.dispatchEvent(new Event('change', {{bubbles: true}}));",
                "     return true;",
                "   }}",
                " }}",
                " return false; }})()"
            ),
            escape_js(selector),
            escape_js(label)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        if !js_value(&result).as_bool().unwrap_or(false) {
            return Err(Error::NotFound(format!(
                "option '{}' in '{}'",
                label, selector
            )));
        }
        Ok(())
    }

    /// Fill the form field associated with a visible label: focus it, clear
    /// it, insert the text, then fire an input event.
    pub async fn fill_by_label(&self, label: &str, value: &str) -> Result<()> {
        let js = format!(
            concat!(
                "(function() {{ var needle = '{}';",
                " var labels = document.querySelectorAll('label');",
                " for (var i = 0; i < labels.length; i++) {{",
                "   var lab = labels[i];",
                "   if (!lab.textContent || lab.textContent.indexOf(needle) === -1) continue;",
                "   var target = null;",
                "   var id = lab.getAttribute('for');",
                "   if (id) target = document.getElementById(id);",
                "   if (!target) target = lab.querySelector('input, textarea, select');",
                "   if (target) {{ target.scrollIntoView({{block: 'center'}}); target.focus(); return true; }}",
                " }}",
                " var els = document.querySelectorAll('input, textarea');",
                " for (var i = 0; i < els.length; i++) {{",
                "   var el = els[i];",
                "   if ((el.getAttribute('aria-label') || '') === needle || (el.getAttribute('placeholder') || '') === needle) {{",
                "     el.scrollIntoView({{block: 'center'}}); el.focus(); return true;",
                "   }}",
                " }}",
                " return false; }})()"
            ),
            escape_js(label)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        if !js_value(&result).as_bool().unwrap_or(false) {
            return Err(Error::NotFound(format!("field labeled '{}'", label)));
        }

        // Clear existing content and insert new text
        self.cdp
            .evaluate_js(
                "document.activeElement && (document.activeElement.value = '', document.activeElement.textContent = '')",
            )
            .await?;
        self.cdp.insert_text(value).await?;

        // Dispatch input event for frameworks
        self.cdp
            .evaluate_js(
                "document.activeElement && document.activeElement.dispatchEvent(new Event('input', {bubbles: true}))",
            )
            .await?;
        Ok(())
    }

    /// Set a local file on the first matching `<input type=file>` and fire
    /// the change event.
    pub async fn upload_file(&self, selector: &str, file: &std::path::Path) -> Result<()> {
        if !file.exists() {
            return Err(Error::NotFound(format!("file '{}'", file.display())));
        }

        let root = self.document_root().await?;
        let node_ids = self.cdp.query_selector_all(root, selector).await?;
        let node_id = *node_ids
            .first()
            .ok_or_else(|| Error::NotFound(format!("file input '{}'", selector)))?;
        let object_id = self.cdp.resolve_node(node_id).await?;
        self.cdp
            .set_file_input_files_by_object(vec![file.display().to_string()], &object_id)
            .await?;

        // Dispatch change event on the input itself
        self.cdp
            .call_function_on(
                &object_id,
                "function() { this.dispatchEvent(new Event('change', {bubbles: true})); }",
            )
            .await?;
        Ok(())
    }

    // ─── Screenshots ──────────────────────────────────────────────────

    /// Full-page screenshot as PNG bytes.
    pub async fn screenshot_page(&self) -> Result<Vec<u8>> {
        let base64_data = self.cdp.screenshot(true).await?;
        decode_png(&base64_data)
    }

    /// Screenshot of the first element matching the selector, clipped to
    /// its border box, as PNG bytes.
    pub async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>> {
        let js = format!(
            concat!(
                "(function() {{ var el = document.querySelector('{}');",
                " if (!el) return null;",
                " var r = el.getBoundingClientRect();",
                " return {{ x: r.left + window.scrollX, y: r.top + window.scrollY,",
                "          width: r.width, height: r.height }}; }})()"
            ),
            escape_js(selector)
        );
        let result = self.cdp.evaluate_js(&js).await?;
        let rect = js_value(&result);
        if rect.is_null() {
            return Err(Error::NotFound(format!("element '{}'", selector)));
        }
        let x = rect.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let y = rect.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let width = rect.get("width").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let height = rect.get("height").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if width <= 0.0 || height <= 0.0 {
            return Err(Error::Browser(format!(
                "element '{}' has no visible box",
                selector
            )));
        }

        let base64_data = self.cdp.screenshot_clip(x, y, width, height).await?;
        decode_png(&base64_data)
    }

    async fn document_root(&self) -> Result<i64> {
        let doc = self.cdp.get_document().await?;
        Ok(doc
            .get("root")
            .and_then(|r| r.get("nodeId"))
            .and_then(|v| v.as_i64())
            .unwrap_or(1))
    }
}

/// Escape a string for embedding in single quotes inside evaluated JS.
fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Dig the returned value out of a Runtime.evaluate result.
fn js_value(result: &Value) -> Value {
    result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Center coordinates from a DOM.getBoxModel response.
fn extract_center_from_box_model(bm: &Value) -> (f64, f64) {
    if let Some(content) = bm
        .get("model")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array())
    {
        if content.len() >= 8 {
            let x1 = content[0].as_f64().unwrap_or(0.0);
            let y1 = content[1].as_f64().unwrap_or(0.0);
            let x2 = content[4].as_f64().unwrap_or(0.0);
            let y2 = content[5].as_f64().unwrap_or(0.0);
            return ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
        }
    }
    (0.0, 0.0)
}

fn decode_png(base64_data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(base64_data)
        .map_err(|e| Error::Browser(format!("base64 decode: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_js() {
        assert_eq!(escape_js("plain"), "plain");
        assert_eq!(escape_js("it's"), "it\\'s");
        assert_eq!(escape_js(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_js_value_digging() {
        let result = json!({"result": {"type": "boolean", "value": true}});
        assert_eq!(js_value(&result), json!(true));
        assert_eq!(js_value(&json!({})), Value::Null);
    }

    #[test]
    fn test_box_model_center() {
        let bm = json!({
            "model": {
                "content": [100.0, 200.0, 300.0, 200.0, 300.0, 260.0, 100.0, 260.0]
            }
        });
        assert_eq!(extract_center_from_box_model(&bm), (200.0, 230.0));
    }

    #[test]
    fn test_box_model_center_missing() {
        assert_eq!(extract_center_from_box_model(&json!({})), (0.0, 0.0));
    }

    #[test]
    fn test_decode_png_rejects_garbage() {
        assert!(decode_png("not base64 at all!!!").is_err());
        assert_eq!(decode_png("aGVsbG8=").unwrap(), b"hello");
    }
}
