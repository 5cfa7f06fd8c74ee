use crate::cache::{CachedFile, FileCache};
use crate::http::{Method, Request, Response};
use crate::middleware::{Flow, Middleware};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_PATH_LEN: usize = 1024;

/// Serves files below `root`. Requests that do not name a readable file fall
/// through to the router.
pub struct StaticFiles {
    root: PathBuf,
    prefix: String,
    cache: FileCache,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: String::from("/"),
            cache: FileCache::default(),
        }
    }

    /// Only serve paths below `prefix`, which is stripped before the lookup.
    pub fn at(mut self, prefix: &str) -> Self {
        self.prefix = format!("/{}", prefix.trim_matches('/'));
        self
    }

    pub fn with_cache(mut self, cache: FileCache) -> Self {
        self.cache = cache;
        self
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        if path.len() > MAX_PATH_LEN {
            return None;
        }
        let decoded = urlencoding::decode(path).ok()?;
        if decoded.contains("..") || decoded.contains('\0') {
            return None;
        }
        let relative = decoded.strip_prefix(self.prefix.as_str())?;
        if self.prefix != "/" && !relative.is_empty() && !relative.starts_with('/') {
            return None;
        }
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn load(&self, file: &Path) -> Option<(Arc<[u8]>, Option<std::time::SystemTime>)> {
        let metadata = fs::metadata(file).ok().filter(|m| m.is_file())?;
        let modified = metadata.modified().ok();
        if let Some(bytes) = self.cache.get(file, modified) {
            return Some((bytes, modified));
        }
        match fs::read(file) {
            Ok(contents) => {
                let bytes: Arc<[u8]> = Arc::from(contents);
                self.cache.insert(
                    file.to_path_buf(),
                    CachedFile {
                        bytes: bytes.clone(),
                        modified,
                    },
                );
                Some((bytes, modified))
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "failed to read static file");
                None
            }
        }
    }
}

impl Middleware for StaticFiles {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Flow::Continue;
        }
        let Some(file) = self.resolve(&req.path) else {
            return Flow::Continue;
        };
        let Some((bytes, modified)) = self.load(&file) else {
            return Flow::Continue;
        };

        res.set_header("Content-Type", content_type(&file))
            .set_header("Cache-Control", "public, max-age=3600");
        if let Some(modified) = modified {
            res.set_header("Last-Modified", httpdate::fmt_http_date(modified));
        }
        res.send_bytes(bytes.to_vec());
        Flow::Halt
    }
}

fn content_type(file: &Path) -> &'static str {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        dir
    }

    fn serve(files: &StaticFiles, method: Method, path: &str) -> (Flow, Response) {
        let mut req = Request::new(method, path);
        let mut res = Response::new();
        let flow = files.handle(&mut req, &mut res);
        (flow, res)
    }

    #[test]
    fn serves_existing_files() {
        let dir = site();
        let files = StaticFiles::new(dir.path());

        let (flow, res) = serve(&files, Method::GET, "/css/site.css");
        assert_eq!(flow, Flow::Halt);
        assert_eq!(res.body(), b"body{}");
        assert_eq!(res.get_header("Content-Type"), Some("text/css"));
        assert_eq!(res.get_header("Cache-Control"), Some("public, max-age=3600"));
        assert!(res.get_header("Last-Modified").is_some());

        // second hit comes from the cache
        let (flow, res) = serve(&files, Method::GET, "/index.html");
        assert_eq!(flow, Flow::Halt);
        assert_eq!(res.get_header("Content-Type"), Some("text/html"));
    }

    #[test]
    fn falls_through_when_not_served() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        for path in ["/missing.txt", "/css", "/../secret", "/css/%2e%2e/index.html", "/"] {
            let (flow, res) = serve(&files, Method::GET, path);
            assert_eq!(flow, Flow::Continue, "{path}");
            assert!(!res.is_sent());
        }
        let (flow, _) = serve(&files, Method::POST, "/index.html");
        assert_eq!(flow, Flow::Continue);
    }

    #[test]
    fn prefix_is_stripped() {
        let dir = site();
        let files = StaticFiles::new(dir.path()).at("/assets/");
        let (flow, res) = serve(&files, Method::GET, "/assets/css/site.css");
        assert_eq!(flow, Flow::Halt);
        assert_eq!(res.body(), b"body{}");

        assert_eq!(serve(&files, Method::GET, "/css/site.css").0, Flow::Continue);
        assert_eq!(serve(&files, Method::GET, "/assetscss/site.css").0, Flow::Continue);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a/b.PNG")), "image/png");
        assert_eq!(content_type(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}
