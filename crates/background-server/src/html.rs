//! HTML rendering surface and location-info sink for the new-tab page

use background_cache::{Container, DisplayHandle, LocationInfo, LocationNotifier, RenderError};
use std::sync::Mutex;

/// Builds the background element as an HTML fragment
#[derive(Debug, Default)]
pub struct HtmlContainer {
    children: Vec<String>,
}

impl HtmlContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_html(self) -> String {
        self.children.concat()
    }
}

impl Container for HtmlContainer {
    fn clear(&mut self) {
        self.children.clear();
    }

    fn append_image(&mut self, handle: &DisplayHandle, alt: &str) -> Result<(), RenderError> {
        if handle.as_str().is_empty() {
            return Err(RenderError("empty display handle".to_string()));
        }
        self.children.push(format!(
            r#"<img class="background-image" src="{}" alt="{}">"#,
            escape(handle.as_str()),
            escape(alt)
        ));
        Ok(())
    }

    fn show_error(&mut self, message: &str) {
        self.children = vec![format!(
            r#"<div class="background-error">{}</div>"#,
            escape(message)
        )];
    }
}

/// Keeps the most recent location line for the page to poll
#[derive(Debug, Default)]
pub struct LatestLocation {
    current: Mutex<Option<LocationInfo>>,
}

impl LatestLocation {
    pub fn get(&self) -> Option<LocationInfo> {
        self.current.lock().ok().and_then(|current| current.clone())
    }

    /// Forget the current line, e.g. before showing a background without credits
    pub fn reset(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

impl LocationNotifier for LatestLocation {
    fn notify_location(&self, text: &str, link_url: Option<&str>, link_label: Option<&str>) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(LocationInfo {
                text: text.to_string(),
                link_url: link_url.map(String::from),
                link_label: link_label.map(String::from),
            });
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use background_cache::{HandleRegistry, ImageBlob, Source};

    fn handle() -> DisplayHandle {
        HandleRegistry::new("/handles").acquire(Source::Reddit, 1, &ImageBlob::new(vec![1], "image/png"))
    }

    #[test]
    fn test_append_image_escapes_alt() {
        let mut container = HtmlContainer::new();
        container
            .append_image(&handle(), r#"Rock & "Roll" <b>"#)
            .unwrap();
        assert_eq!(
            container.into_html(),
            r#"<img class="background-image" src="/handles/1" alt="Rock &amp; &quot;Roll&quot; &lt;b&gt;">"#
        );
    }

    #[test]
    fn test_clear_and_error() {
        let mut container = HtmlContainer::new();
        container.append_image(&handle(), "a").unwrap();
        container.clear();
        assert!(container.children.is_empty());

        container.append_image(&handle(), "b").unwrap();
        container.show_error("Failed");
        assert_eq!(
            container.into_html(),
            r#"<div class="background-error">Failed</div>"#
        );
    }

    #[test]
    fn test_latest_location_keeps_last_notification() {
        let location = LatestLocation::default();
        assert!(location.get().is_none());

        location.notify_location("First", None, None);
        location.notify_location("Second", Some("https://example.com"), Some("Example"));

        let info = location.get().unwrap();
        assert_eq!(info.text, "Second");
        assert_eq!(info.link_url.as_deref(), Some("https://example.com"));

        location.reset();
        assert!(location.get().is_none());
    }
}
