use anyhow::Context;
use sections::page::{PageLinker, PageRef, RelativeLinker};
use url::Url;

/// Page links under the public base URL when one is configured, relative
/// links otherwise.
#[derive(Debug, Clone, Default)]
pub struct PublicLinker {
    base: Option<Url>,
}

impl PublicLinker {
    pub fn new(public_url: Option<&str>) -> anyhow::Result<Self> {
        let base = match public_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(raw) => {
                let mut url = Url::parse(raw)
                    .with_context(|| format!("invalid server public url '{raw}'"))?;
                if !url.path().ends_with('/') {
                    let path = format!("{}/", url.path());
                    url.set_path(&path);
                }
                Some(url)
            }
            None => None,
        };
        Ok(Self { base })
    }

    fn absolute(&self, relative: String) -> String {
        let Some(base) = &self.base else {
            return relative;
        };
        match base.join(relative.trim_start_matches('/')) {
            Ok(url) => url.into(),
            Err(_) => relative,
        }
    }
}

impl PageLinker for PublicLinker {
    fn page_link(&self, page: &PageRef, subpath: Option<&str>) -> String {
        self.absolute(RelativeLinker.page_link(page, subpath))
    }

    fn edit_form_prefix(&self, page: &PageRef) -> String {
        self.absolute(RelativeLinker.edit_form_prefix(page))
    }
}
