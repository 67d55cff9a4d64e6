//! GitHub repository references.

use crate::error::Error;
use std::fmt;
use url::Url;

/// Ref used when the input names none.
pub const DEFAULT_REF: &str = "HEAD";

/// `owner/repo@ref` on GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub reference: String,
}

impl RepoRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            reference: DEFAULT_REF.to_string(),
        }
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Parse a repository reference.
    ///
    /// Accepted forms: `owner/repo`, `github.com/owner/repo`,
    /// `https://github.com/owner/repo[.git]` and
    /// `https://github.com/owner/repo/tree/<ref>`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim().trim_end_matches('/');
        let invalid = || Error::InvalidRepoRef {
            input: input.to_string(),
        };

        let path = if trimmed.contains("://") {
            let url = Url::parse(trimmed).map_err(|_| invalid())?;
            match url.host_str() {
                Some("github.com" | "www.github.com") => {}
                _ => return Err(invalid()),
            }
            url.path().trim_matches('/').to_string()
        } else if let Some(rest) = trimmed
            .strip_prefix("github.com/")
            .or_else(|| trimmed.strip_prefix("www.github.com/"))
        {
            rest.to_string()
        } else {
            trimmed.to_string()
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (owner, repo, reference) = match segments.as_slice() {
            [owner, repo] => (*owner, *repo, DEFAULT_REF.to_string()),
            // Refs may contain slashes (`feature/x`).
            [owner, repo, "tree" | "blob", rest @ ..] if !rest.is_empty() => {
                (*owner, *repo, rest.join("/"))
            }
            _ => return Err(invalid()),
        };
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if !is_name(owner) || !is_name(repo) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference,
        })
    }
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)?;
        if self.reference != DEFAULT_REF {
            write!(f, "@{}", self.reference)?;
        }
        Ok(())
    }
}
