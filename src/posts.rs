//! Jekyll post writer for change notifications.

use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Local};
use regex::Regex;
use tracing::info;

use crate::contract::{ChangeKind, PostPayload, PostSink};
use crate::error::OutputError;

/// Writes one markdown file per notification into `posts_dir`.
pub struct JekyllPostWriter {
    posts_dir: PathBuf,
    clock: fn() -> DateTime<Local>,
}

impl JekyllPostWriter {
    pub fn new(posts_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
            clock: Local::now,
        }
    }

    /// Same as [`JekyllPostWriter::new`] with a fixed clock, for reproducible file names.
    pub fn with_clock(posts_dir: impl Into<PathBuf>, clock: fn() -> DateTime<Local>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
            clock,
        }
    }

    pub fn file_name(post: &PostPayload, date: &DateTime<Local>) -> String {
        format!(
            "{}-{}-{}.md",
            date.format("%Y-%m-%d"),
            slugify(&post.shortname),
            slugify(&post.version)
        )
    }
}

pub fn title(post: &PostPayload) -> String {
    match post.kind {
        ChangeKind::New => format!("{} has released {}", post.author, post.shortname),
        ChangeKind::Update => format!(
            "{} by {} has been updated to {}",
            post.shortname, post.author, post.version
        ),
    }
}

pub fn render(post: &PostPayload, date: &DateTime<Local>) -> String {
    format!(
        "---\ntitle: {}\ndate: {}\ncategories: [{}, {}]\ntags: [{}]\n---\n\n{}",
        quote(&title(post)),
        date.format("%Y-%m-%d %H:%M:%S %z"),
        quote(&post.author),
        quote(&post.shortname),
        post.kind.as_str(),
        post.content
    )
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn slugify(value: &str) -> String {
    static NON_SLUG: OnceLock<Regex> = OnceLock::new();
    let re = NON_SLUG.get_or_init(|| Regex::new(r"[^a-z0-9.]+").expect("static regex"));
    re.replace_all(&value.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

impl PostSink for JekyllPostWriter {
    fn publish(&self, post: &PostPayload) -> Result<(), OutputError> {
        let date = (self.clock)();
        let path = self.posts_dir.join(Self::file_name(post, &date));
        let io_err = |source| OutputError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.posts_dir).map_err(io_err)?;
        fs::write(&path, render(post, &date)).map_err(io_err)?;
        info!(path = %path.display(), kind = post.kind.as_str(), "Created post");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2023, 4, 5, 12, 0, 0).unwrap()
    }

    fn payload(kind: ChangeKind) -> PostPayload {
        PostPayload {
            author: "Spiritualized".into(),
            shortname: "GB Color".into(),
            version: "1.2.0".into(),
            kind,
            content: "Fixed audio.".into(),
        }
    }

    #[test]
    fn titles_depend_on_change_kind() {
        assert_eq!(
            title(&payload(ChangeKind::New)),
            "Spiritualized has released GB Color"
        );
        assert_eq!(
            title(&payload(ChangeKind::Update)),
            "GB Color by Spiritualized has been updated to 1.2.0"
        );
    }

    #[test]
    fn writes_front_matter_and_content() {
        let dir = tempdir().unwrap();
        let writer = JekyllPostWriter::with_clock(dir.path(), fixed);
        writer.publish(&payload(ChangeKind::Update)).unwrap();

        let path = dir.path().join("2023-04-05-gb-color-1.2.0.md");
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("---\ntitle: \"GB Color by Spiritualized has been updated to 1.2.0\"\n"));
        assert!(text.contains("categories: [\"Spiritualized\", \"GB Color\"]\n"));
        assert!(text.contains("tags: [update]\n"));
        assert!(text.ends_with("---\n\nFixed audio."));
    }
}
