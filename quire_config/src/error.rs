#[derive(Debug)]
pub struct ConfigError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ConfigError {
    pub fn new<S>(kind: ErrorKind, message: S) -> ConfigError
    where
        S: AsRef<str>,
    {
        ConfigError {
            kind,
            message: message.as_ref().to_owned(),
        }
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    IoError(std::io::Error),
    TomlParseError(toml::de::Error),
    JsonError(serde_json::Error),
    ParseError(String),
    NotFound,
    IsNotDirectory,
    IsDirectory,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::IoError(e) => write!(f, "{}: {}", self.message, e),
            ErrorKind::TomlParseError(e) => write!(f, "{}: {}", self.message, e),
            ErrorKind::JsonError(e) => write!(f, "{}: {}", self.message, e),
            ErrorKind::ParseError(e) => write!(f, "{}: {}", self.message, e),
            ErrorKind::NotFound | ErrorKind::IsNotDirectory | ErrorKind::IsDirectory => {
                write!(f, "{}", self.message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
