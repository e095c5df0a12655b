use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("File at {:?} not found.{}", path, Error::format_suggestion(suggestion))]
    FileNotFound {
        path: std::path::PathBuf,
        suggestion: Option<String>,
    },

    #[error("File at {:?} is invalid{}.", path, Error::format_msg_as_detail(msg))]
    FileNotValid {
        path: std::path::PathBuf,
        msg: Option<String>,
    },

    #[error("--{} is required when {} is enabled.", arg, required_by)]
    MissingArgument { arg: String, required_by: String },

    #[error("Failed parsing {}{}", context, Error::format_msg_as_detail(msg))]
    ParseError {
        context: String,
        msg: Option<String>,
    },

    #[error("Barcodes are not the same ({} vs {} barcodes).", left, right)]
    BarcodesMismatch { left: usize, right: usize },

    #[error("Duplicated gene_id: {}", ids.join(", "))]
    DuplicatedFeatures { ids: Vec<String> },

    #[error(
        "Matrix of shape {}x{} does not match {} features and {} barcodes.",
        rows,
        cols,
        n_features,
        n_barcodes
    )]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        n_features: usize,
        n_barcodes: usize,
    },

    #[error("Barcode index {} is out of bounds for {} barcodes.", index, len)]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Feature '{}' is not in the feature catalog.", id)]
    UnknownFeature { id: String },

    #[error("Cannot infer TCR/BCR from chain '{}'.", chain)]
    UnknownChain { chain: String },
}

impl Error {
    #[cold]
    pub fn file_not_found<P: AsRef<std::path::Path>>(path: P) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
            suggestion: None,
        }
    }

    #[cold]
    pub fn file_not_found_with_suggestion<P: AsRef<std::path::Path>, S: Into<String>>(
        path: P,
        suggestion: S,
    ) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
            suggestion: Some(suggestion.into()),
        }
    }

    #[cold]
    pub fn file_not_valid<P: AsRef<std::path::Path>, M: Into<String>>(
        path: P,
        msg: Option<M>,
    ) -> Self {
        Error::FileNotValid {
            path: path.as_ref().to_path_buf(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn missing_argument<A: Into<String>, R: Into<String>>(arg: A, required_by: R) -> Self {
        Error::MissingArgument {
            arg: arg.into(),
            required_by: required_by.into(),
        }
    }

    #[cold]
    pub fn parse_error<C: Into<String>, M: Into<String>>(context: C, msg: Option<M>) -> Self {
        Error::ParseError {
            context: context.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    pub fn format_msg_as_detail(msg: &Option<String>) -> String {
        match msg {
            Some(m) => format!(" ({})", m),
            None => String::new(),
        }
    }

    pub fn format_suggestion(suggestion: &Option<String>) -> String {
        match suggestion {
            Some(s) => format!("\nSOLUTION: {}", s),
            None => String::new(),
        }
    }
}
