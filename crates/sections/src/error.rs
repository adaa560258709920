use thiserror::Error;

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("unknown section type '{0}'")]
    UnknownType(String),
    #[error("no template found for '{section_type}', tried: {}", tried.join(", "))]
    NoTemplateFound {
        section_type: String,
        tried: Vec<String>,
    },
    #[error("could not resolve a controller for '{section_type}': default controller '{default}' is not registered")]
    ControllerResolution {
        section_type: String,
        default: String,
    },
    #[error("'{value}' is not a declared {field} for section type '{section_type}'")]
    InvalidOption {
        section_type: String,
        field: &'static str,
        value: String,
    },
    #[error("template '{name}' failed to render: {source}")]
    Template {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("section type '{0}' is registered more than once")]
    DuplicateType(String),
    #[error("section type '{child}' names unknown parent '{parent}'")]
    UnknownParent { child: String, parent: String },
    #[error("section type ancestry of '{0}' contains a cycle")]
    Cycle(String),
    #[error("expected exactly one root section type, found {0:?}")]
    RootCount(Vec<String>),
}
