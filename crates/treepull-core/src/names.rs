use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoUrlError {
    #[error("invalid repository URL '{url}': expected <host>/<owner>/<repo>")]
    MissingSegments { url: String },
    #[error("invalid repository URL '{url}': segment '{segment}' contains invalid character '{character}'")]
    InvalidCharacter {
        url: String,
        segment: String,
        character: char,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocator {
    pub host: String,
    pub owner: String,
    pub repo: String,
    /// Set for `file://` repositories; owner and repo are its last two segments.
    pub local_path: Option<String>,
    /// Address handed to git. Trailing path segments of the input are dropped.
    pub remote: String,
}

impl RepoLocator {
    pub fn canonical_url(&self) -> String {
        match &self.local_path {
            Some(path) => format!("file://{path}"),
            None => format!("https://{}/{}/{}", self.host, self.owner, self.repo),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn cache_key(&self) -> String {
        match &self.local_path {
            Some(path) => sanitize_repo_component(&format!("{}{path}", self.host)),
            None => sanitize_repo_component(&format!("{}-{}-{}", self.host, self.owner, self.repo)),
        }
    }
}

/// Accepts `https://host/owner/repo`, `host/owner/repo`, `git@host:owner/repo`
/// and any of those with a `.git` suffix or trailing path segments. A
/// `file://` URL names a local repository by its full path.
pub fn parse_repo_url(url: &str) -> Result<RepoLocator, RepoUrlError> {
    let trimmed = url.trim();
    if let Some(path) = strip_prefix_ignore_case(trimmed, "file://") {
        return parse_local_path(url, path);
    }
    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, trimmed),
    };
    let (user, rest) = match rest.split_once('@') {
        Some((user, rest)) => (Some(user), rest),
        None => (None, rest),
    };
    let normalized = if scheme.is_none() && user.is_some() {
        rest.replacen(':', "/", 1)
    } else {
        rest.to_string()
    };

    let mut segments = normalized.split('/').filter(|segment| !segment.is_empty());
    let (Some(host), Some(owner), Some(repo)) = (segments.next(), segments.next(), segments.next())
    else {
        return Err(RepoUrlError::MissingSegments {
            url: url.to_string(),
        });
    };

    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    for segment in [owner, repo] {
        validate_segment(url, segment)?;
    }

    let host = host.to_ascii_lowercase();
    let remote = match (scheme, user) {
        (Some(scheme), Some(user)) => format!("{scheme}://{user}@{host}/{owner}/{repo}"),
        (Some(scheme), None) => format!("{scheme}://{host}/{owner}/{repo}"),
        (None, Some(user)) => format!("{user}@{host}:{owner}/{repo}"),
        (None, None) => format!("https://{host}/{owner}/{repo}"),
    };

    Ok(RepoLocator {
        host,
        owner: owner.to_string(),
        repo: repo.to_string(),
        local_path: None,
        remote,
    })
}

fn parse_local_path(url: &str, path: &str) -> Result<RepoLocator, RepoUrlError> {
    let path = path.trim_end_matches('/');
    let mut segments = path.rsplit('/').filter(|segment| !segment.is_empty());
    let (Some(repo), Some(owner)) = (segments.next(), segments.next()) else {
        return Err(RepoUrlError::MissingSegments {
            url: url.to_string(),
        });
    };

    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    for segment in [owner, repo] {
        validate_segment(url, segment)?;
    }

    Ok(RepoLocator {
        host: "local".to_string(),
        owner: owner.to_string(),
        repo: repo.to_string(),
        local_path: Some(path.to_string()),
        remote: format!("file://{path}"),
    })
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn validate_segment(url: &str, segment: &str) -> Result<(), RepoUrlError> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(RepoUrlError::MissingSegments {
            url: url.to_string(),
        });
    }

    for character in segment.chars() {
        if character.is_ascii_alphanumeric()
            || character == '-'
            || character == '_'
            || character == '.'
        {
            continue;
        }

        return Err(RepoUrlError::InvalidCharacter {
            url: url.to_string(),
            segment: segment.to_string(),
            character,
        });
    }

    Ok(())
}

pub fn sanitize_repo_component(value: &str) -> String {
    let mut output = String::with_capacity(value.len());

    for character in value.chars() {
        if character.is_ascii_lowercase()
            || character.is_ascii_digit()
            || character == '_'
            || character == '-'
        {
            output.push(character);
        } else if character.is_ascii_uppercase() {
            output.push(character.to_ascii_lowercase());
        } else {
            output.push('-');
        }
    }

    if output.is_empty() {
        return "repo".to_string();
    }

    output
}
