/// Provides the PackUri value type for part names within an OPC package.
///
/// A PackUri always begins with a forward slash and uses forward slashes as
/// path separators, following the Open Packaging Conventions specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackUri {
    /// The full pack URI string (e.g., "/word/document.xml")
    uri: String,
}

impl PackUri {
    /// Create a new PackUri from a string.
    ///
    /// Fails if the URI doesn't start with a forward slash.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self, String> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(format!("PackUri must begin with slash, got '{uri}'"));
        }
        Ok(PackUri { uri })
    }

    /// Resolve a relative reference against a base URI.
    ///
    /// Translates a reference like "media/image1.png" or "../styles.xml" onto
    /// a base URI like "/word" to produce an absolute PackUri.
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self, String> {
        let joined = if base_uri.ends_with('/') {
            format!("{base_uri}{relative_ref}")
        } else {
            format!("{base_uri}/{relative_ref}")
        };
        Self::new(normalize_path(&joined))
    }

    /// The directory portion, e.g. "/word" for "/word/document.xml".
    pub fn base_uri(&self) -> &str {
        if self.uri == "/" {
            return "/";
        }
        match self.uri.rfind('/') {
            Some(0) => "/",
            Some(pos) => &self.uri[..pos],
            None => "/",
        }
    }

    /// The filename portion, e.g. "document.xml" for "/word/document.xml".
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// The extension (no leading period), e.g. "xml" for "/word/document.xml".
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// The ZIP member name: the URI with its leading slash stripped.
    pub fn membername(&self) -> &str {
        if self.uri == "/" { "" } else { &self.uri[1..] }
    }

    /// The relative reference from a base URI to this PackUri.
    ///
    /// For example "/word/media/image1.png" relative to "/word" is
    /// "media/image1.png".
    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();
        let common = from
            .iter()
            .zip(to.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut result = String::new();
        for _ in common..from.len() {
            result.push_str("../");
        }
        for (i, part) in to.iter().enumerate().skip(common) {
            if i > common {
                result.push('/');
            }
            result.push_str(part);
        }
        result
    }

    /// The PackUri of the .rels part corresponding to this PackUri.
    ///
    /// For example "/word/_rels/document.xml.rels" for "/word/document.xml",
    /// and "/_rels/.rels" for the package pseudo-partname "/".
    pub fn rels_uri(&self) -> Result<PackUri, String> {
        let base_uri = self.base_uri();
        let rels_filename = format!("{}.rels", self.filename());
        if base_uri == "/" {
            Self::new(format!("/_rels/{rels_filename}"))
        } else {
            Self::new(format!("{base_uri}/_rels/{rels_filename}"))
        }
    }

    /// Get the full URI string.
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl std::fmt::Display for PackUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackUri {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

/// Resolve "." and ".." segments.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {
                if parts.is_empty() {
                    parts.push("");
                }
            }
            ".." => {
                if parts.len() > 1 {
                    parts.pop();
                }
            }
            _ => parts.push(part),
        }
    }
    if parts.is_empty() || (parts.len() == 1 && parts[0].is_empty()) {
        return "/".to_string();
    }
    parts.join("/")
}

/// The package pseudo-partname, representing the package itself
pub const PACKAGE_URI: &str = "/";

/// The URI for the [Content_Types].xml part
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";
