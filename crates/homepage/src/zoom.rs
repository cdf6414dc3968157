use crate::page::Page;

/// The one zoom overlay. Opening it while open swaps the image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoomModal {
    source: Option<String>,
}

impl ZoomModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, page: &mut Page, source: &str) {
        self.source = Some(source.to_string());
        page.set_blurred(true);
    }

    pub fn close(&mut self, page: &mut Page) {
        self.source = None;
        page.set_blurred(false);
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Opens the modal for a zoomable element; anything else is ignored.
    pub fn open_target(&mut self, page: &mut Page, element_id: &str) -> bool {
        let Some(source) = page
            .get(element_id)
            .and_then(|element| element.zoom_source.clone())
        else {
            return false;
        };
        self.open(page, &source);
        true
    }

    /// A click inside the overlay: only the backdrop closes it.
    pub fn click(&mut self, page: &mut Page, on_image: bool) {
        if self.is_open() && !on_image {
            self.close(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_blurs_and_close_restores() {
        let mut page = Page::standard();
        let mut modal = ZoomModal::new();
        modal.open(&mut page, "abc.onion:8333");
        assert!(modal.is_open());
        assert!(page.is_blurred());
        assert_eq!(modal.source(), Some("abc.onion:8333"));

        modal.close(&mut page);
        assert!(!modal.is_open());
        assert!(!page.is_blurred());
    }

    #[test]
    fn reopening_replaces_image() {
        let mut page = Page::standard();
        let mut modal = ZoomModal::new();
        modal.open(&mut page, "first");
        modal.open(&mut page, "second");
        assert_eq!(modal.source(), Some("second"));
        assert!(page.is_blurred());
    }

    #[test]
    fn backdrop_click_closes_image_click_does_not() {
        let mut page = Page::standard();
        let mut modal = ZoomModal::new();
        modal.open(&mut page, "qr");
        modal.click(&mut page, true);
        assert!(modal.is_open());
        modal.click(&mut page, false);
        assert!(!modal.is_open());
        assert!(!page.is_blurred());
    }

    #[test]
    fn only_zoomable_elements_open() {
        let mut page = Page::standard();
        let plain = page.add_link("Mempool", "http://mempool.local", false);
        let qr = page.add_link("Fulcrum SSL", "fulcrum.local:50002", true);
        let mut modal = ZoomModal::new();
        assert!(!modal.open_target(&mut page, &plain));
        assert!(!modal.is_open());
        assert!(modal.open_target(&mut page, &qr));
        assert_eq!(modal.source(), Some("fulcrum.local:50002"));
    }
}
