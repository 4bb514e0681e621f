//! Extension-to-backend lookup, grounded on `preview/backends/base.py`'s
//! `EXTENSIONS` class attribute and the original app's per-extension
//! dispatch table built in `preview/__init__.py`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::Backend;
use crate::error::{MediaError, Result};

#[derive(Clone)]
pub struct BackendRegistry {
    by_extension: HashMap<&'static str, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        BackendRegistry { by_extension: HashMap::new() }
    }

    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        for ext in backend.extensions() {
            self.by_extension.insert(ext, backend.clone());
        }
    }

    pub fn select(&self, extension: &str) -> Result<Arc<dyn Backend>> {
        self.by_extension
            .get(extension)
            .cloned()
            .ok_or_else(|| MediaError::unsupported_type(extension))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{ImageBackend, OfficeBackend, PdfBackend, VideoBackend};

    #[test]
    fn every_backend_extension_resolves() {
        let mut reg = BackendRegistry::new();
        reg.register(Arc::new(ImageBackend::new()));
        reg.register(Arc::new(PdfBackend::new()));
        reg.register(Arc::new(OfficeBackend::new()));
        reg.register(Arc::new(VideoBackend::new()));

        assert_eq!(reg.select("png").unwrap().name(), "image");
        assert_eq!(reg.select("pdf").unwrap().name(), "pdf");
        assert_eq!(reg.select("docx").unwrap().name(), "office");
        assert_eq!(reg.select("mp4").unwrap().name(), "video");
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let reg = BackendRegistry::new();
        assert!(reg.select("exe").is_err());
    }
}
