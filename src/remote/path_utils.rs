//! Remote path utilities
//!
//! Remote paths always use `/` as separator regardless of the local or remote
//! OS. [`VirtualCwd`] keeps a client-side working directory for transports
//! that have no session-scoped one.

use std::future::Future;

use super::error::RemoteError;

/// Check if a remote path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Join remote path components using `/` separator.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if component.is_empty() {
        base.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Lexically normalize an absolute remote path.
///
/// Empty and `.` elements are dropped, `..` removes the preceding element and
/// never climbs above `/`, repeated and trailing slashes collapse. The result
/// always starts with `/`. Relative input is treated as rooted at `/`.
pub fn normalize_remote_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Resolve `path` against `cwd`: absolute paths are only normalized,
/// relative ones are joined onto `cwd` first.
pub fn resolve_remote_path(cwd: &str, path: &str) -> String {
    if is_absolute_remote_path(path) {
        normalize_remote_path(path)
    } else {
        normalize_remote_path(&join_remote_path(cwd, path))
    }
}

/// Client-maintained working directory.
///
/// Always holds an absolute, normalized path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualCwd {
    path: String,
}

impl VirtualCwd {
    /// Seed from the directory the server reports at login.
    pub fn new(start: &str) -> Self {
        Self {
            path: normalize_remote_path(start),
        }
    }

    pub fn get(&self) -> &str {
        &self.path
    }

    pub fn resolve(&self, path: &str) -> String {
        resolve_remote_path(&self.path, path)
    }

    /// Move to `dir` once `exists` confirms the resolved target.
    ///
    /// On any failure the current directory is left untouched; a target that
    /// does not exist is reported as `NotFound` carrying the resolved path.
    pub async fn change_dir<F, Fut>(&mut self, dir: &str, exists: F) -> Result<(), RemoteError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<bool, RemoteError>>,
    {
        let target = self.resolve(dir);
        if !exists(target.clone()).await? {
            return Err(RemoteError::NotFound(target));
        }
        self.path = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute_remote_path() {
        assert!(is_absolute_remote_path("/home/user"));
        assert!(is_absolute_remote_path("/"));
        assert!(!is_absolute_remote_path("relative/path"));
        assert!(!is_absolute_remote_path("C:\\Windows"));
    }

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/home", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/home/", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/", "home"), "/home");
        assert_eq!(join_remote_path("/home", ""), "/home");
    }

    #[test]
    fn test_normalize_remote_path() {
        assert_eq!(normalize_remote_path("/"), "/");
        assert_eq!(normalize_remote_path("/a/b/../c/./d/"), "/a/c/d");
        assert_eq!(normalize_remote_path("//a//b"), "/a/b");
        assert_eq!(normalize_remote_path("/../.."), "/");
        assert_eq!(normalize_remote_path("/a/.."), "/");
    }

    #[test]
    fn test_resolve_relative_joins_cwd() {
        let cwd = "/home/user";
        for rel in ["dl", "dl/", "./dl", "dl/../dl", "../user/dl", ""] {
            let expected = normalize_remote_path(&join_remote_path(cwd, rel));
            assert_eq!(resolve_remote_path(cwd, rel), expected, "rel {:?}", rel);
        }
        assert_eq!(resolve_remote_path(cwd, "dl"), "/home/user/dl");
        assert_eq!(resolve_remote_path(cwd, ".."), "/home");
    }

    #[test]
    fn test_resolve_absolute_ignores_cwd() {
        assert_eq!(resolve_remote_path("/home/user", "/srv//x/./y"), "/srv/x/y");
        assert_eq!(resolve_remote_path("/home/user", "/"), "/");
    }

    #[tokio::test]
    async fn test_change_dir_commits_existing_target() {
        let mut cwd = VirtualCwd::new("/home/user");
        cwd.change_dir("incoming", |p| async move { Ok(p == "/home/user/incoming") })
            .await
            .unwrap();
        assert_eq!(cwd.get(), "/home/user/incoming");
    }

    #[tokio::test]
    async fn test_change_dir_missing_target_keeps_cwd() {
        let mut cwd = VirtualCwd::new("/home/user");
        let err = cwd
            .change_dir("../nope", |_| async { Ok(false) })
            .await
            .unwrap_err();
        match err {
            RemoteError::NotFound(path) => assert_eq!(path, "/home/nope"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert_eq!(cwd.get(), "/home/user");
    }

    #[tokio::test]
    async fn test_change_dir_probe_error_keeps_cwd() {
        let mut cwd = VirtualCwd::new("/srv");
        let err = cwd
            .change_dir("x", |_| async { Err(RemoteError::Network("reset".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Network(_)));
        assert_eq!(cwd.get(), "/srv");
    }
}
