//! Document collections that queries run against.
//!
//! A [`Corpus`] answers the questions a FROM clause asks (which documents
//! carry a tag, live in a folder, or link to each other) and hands out each
//! document's fields. [`MemoryCorpus`] is a complete in-memory
//! implementation, loadable from JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde::Deserialize;
use tracing::debug;

use crate::{
    ast::{LinkDirection, Source, SourceOp},
    engine::QueryError,
    evaluator::LinkHandler,
    executor::Pagerow,
    output::value_from_json,
    temporal,
    value::{Link, Object, Value},
};

/// A set of documents addressed by path.
pub trait Corpus: LinkHandler {
    fn all_paths(&self) -> BTreeSet<String>;

    /// Documents carrying `tag` (with its leading `#`) or one of its subtags.
    fn tagged(&self, tag: &str) -> BTreeSet<String>;

    /// Documents at or below `folder`.
    fn in_folder(&self, folder: &str) -> BTreeSet<String>;

    /// Documents linking to `path`.
    fn incoming(&self, path: &str) -> BTreeSet<String>;

    /// Documents `path` links to.
    fn outgoing(&self, path: &str) -> BTreeSet<String>;

    /// Fields of the document at `path`, including its `file` metadata.
    fn page(&self, path: &str) -> Option<Object> {
        self.resolve(path)
    }

    /// Task items of the document at `path`, read from `file.tasks`.
    fn tasks(&self, path: &str) -> Vec<Object> {
        let Some(page) = self.page(path) else {
            return Vec::new();
        };
        match page.get("file").and_then(Value::as_object).and_then(|file| file.get("tasks")) {
            Some(Value::Array(tasks)) => tasks
                .iter()
                .filter_map(|task| task.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn matching(source: &Source, corpus: &dyn Corpus) -> Result<BTreeSet<String>, QueryError> {
    match source {
        Source::Empty => Ok(corpus.all_paths()),
        Source::Tag(tag) => Ok(corpus.tagged(tag)),
        Source::Folder(folder) => Ok(corpus.in_folder(folder)),
        Source::Link { file, direction } => {
            let path = corpus.normalize(file);
            if !corpus.exists(&path) {
                return Err(QueryError::Source(format!(
                    "Could not find a document named '{}'",
                    file
                )));
            }
            Ok(match direction {
                LinkDirection::Incoming => corpus.incoming(&path),
                LinkDirection::Outgoing => corpus.outgoing(&path),
            })
        }
        Source::Negated(inner) => {
            let excluded = matching(inner, corpus)?;
            Ok(corpus
                .all_paths()
                .into_iter()
                .filter(|path| !excluded.contains(path))
                .collect())
        }
        Source::Binary { left, op, right } => {
            let left = matching(left, corpus)?;
            let right = matching(right, corpus)?;
            Ok(match op {
                SourceOp::And => left.intersection(&right).cloned().collect(),
                SourceOp::Or => left.union(&right).cloned().collect(),
            })
        }
    }
}

/// Turns a FROM clause into one row per matching document, in path order.
/// Each row's id is a link to the document and its data the document's fields.
pub fn resolve_source(source: &Source, corpus: &dyn Corpus) -> Result<Vec<Pagerow>, QueryError> {
    let paths = matching(source, corpus)?;
    debug!(documents = paths.len(), "source resolved");
    Ok(paths
        .into_iter()
        .filter_map(|path| {
            let data = corpus.page(&path)?;
            Some(Pagerow::new(Link::file(path), data))
        })
        .collect())
}

/// A document as loaded into a [`MemoryCorpus`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    pub path: String,
    /// Tags, with or without the leading `#`
    #[serde(default)]
    pub tags: Vec<String>,
    /// Paths or names of linked documents
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Metadata fields; strings that look like dates or `[[links]]` are
    /// read as such
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Document {
            path: path.into(),
            tags: Vec::new(),
            links: Vec::new(),
            tasks: Vec::new(),
            fields: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub line: Option<u64>,
    /// Inline fields such as `due`
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

fn with_hash(tag: &str) -> String {
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{}", tag)
    }
}

/// `#a/b/c` expands to `#a`, `#a/b` and `#a/b/c`.
fn expand_tag(tag: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut prefix = String::new();
    for (i, part) in tag.split('/').enumerate() {
        if i > 0 {
            prefix.push('/');
        }
        prefix.push_str(part);
        out.push(prefix.clone());
    }
    out
}

/// File name without folder and extension.
fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

fn folder_of(path: &str) -> &str {
    path.rfind('/').map_or("", |slash| &path[..slash])
}

fn extension_of(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[dot + 1..],
        _ => "",
    }
}

/// An in-memory corpus.
///
/// # Examples
///
/// ```
/// use quarry::{Corpus, MemoryCorpus};
///
/// let corpus = MemoryCorpus::from_json(r##"[
///     {"path": "notes/a.md", "tags": ["#project"], "links": ["b"]},
///     {"path": "notes/b.md"}
/// ]"##).unwrap();
///
/// assert_eq!(corpus.tagged("#project").len(), 1);
/// assert!(corpus.incoming("notes/b.md").contains("notes/a.md"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    documents: BTreeMap<String, Document>,
    /// Lowercased file stem to every path with that stem
    names: BTreeMap<String, BTreeSet<String>>,
    /// Resolved links, built on first use after the documents change
    links: OnceLock<LinkIndex>,
}

/// Normalized link targets in both directions.
#[derive(Debug, Clone, Default)]
struct LinkIndex {
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut corpus = MemoryCorpus::new();
        for document in documents {
            corpus.insert(document);
        }
        corpus
    }

    /// Loads a JSON array of documents.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let documents: Vec<Document> = serde_json::from_str(text)?;
        Ok(Self::from_documents(documents))
    }

    /// Adds or replaces the document at `document.path`.
    pub fn insert(&mut self, document: Document) {
        self.names
            .entry(file_stem(&document.path).to_lowercase())
            .or_default()
            .insert(document.path.clone());
        self.documents.insert(document.path.clone(), document);
        // Adding a document can change what existing links resolve to
        self.links = OnceLock::new();
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn link_index(&self) -> &LinkIndex {
        self.links.get_or_init(|| {
            let mut index = LinkIndex::default();
            for document in self.documents.values() {
                let targets: BTreeSet<String> =
                    document.links.iter().map(|link| self.normalize(link)).collect();
                for target in &targets {
                    index
                        .incoming
                        .entry(target.clone())
                        .or_default()
                        .insert(document.path.clone());
                }
                index.outgoing.insert(document.path.clone(), targets);
            }
            debug!(documents = self.documents.len(), "link index built");
            index
        })
    }

    fn linked(map: &BTreeMap<String, BTreeSet<String>>, path: &str) -> BTreeSet<String> {
        map.get(path).cloned().unwrap_or_default()
    }

    fn task_object(path: &str, task: &Task) -> Object {
        let mut object = Object::new();
        for (key, value) in &task.fields {
            object.insert(key.clone(), value_from_json(value.clone()));
        }
        object.insert("text".to_string(), Value::String(task.text.clone()));
        object.insert("completed".to_string(), Value::Boolean(task.completed));
        object.insert(
            "status".to_string(),
            Value::from(if task.completed { "x" } else { " " }),
        );
        if let Some(line) = task.line {
            object.insert("line".to_string(), Value::Number(line as f64));
        }
        object.insert("path".to_string(), Value::String(path.to_string()));
        object.insert("link".to_string(), Value::Link(Link::file(path)));
        object
    }

    fn build_page(&self, document: &Document) -> Object {
        let path = document.path.as_str();
        let mut page = Object::new();
        for (key, value) in &document.fields {
            page.insert(key.clone(), value_from_json(value.clone()));
        }

        let explicit: Vec<String> = document.tags.iter().map(|t| with_hash(t)).collect();
        let mut expanded: Vec<String> = Vec::new();
        for tag in &explicit {
            for sub in expand_tag(tag) {
                if !expanded.contains(&sub) {
                    expanded.push(sub);
                }
            }
        }

        let index = self.link_index();
        let as_links = |paths: Option<&BTreeSet<String>>| -> Vec<Value> {
            paths
                .into_iter()
                .flatten()
                .map(|p| Value::Link(Link::file(p.as_str())))
                .collect()
        };
        let inlinks = as_links(index.incoming.get(path));
        let outlinks = as_links(index.outgoing.get(path));

        let mut file = Object::new();
        file.insert("path".to_string(), Value::from(path));
        file.insert("name".to_string(), Value::from(file_stem(path)));
        file.insert("folder".to_string(), Value::from(folder_of(path)));
        file.insert("ext".to_string(), Value::from(extension_of(path)));
        file.insert("link".to_string(), Value::Link(Link::file(path)));
        file.insert(
            "tags".to_string(),
            Value::Array(expanded.into_iter().map(Value::String).collect()),
        );
        file.insert(
            "etags".to_string(),
            Value::Array(explicit.into_iter().map(Value::String).collect()),
        );
        file.insert("outlinks".to_string(), Value::Array(outlinks));
        file.insert("inlinks".to_string(), Value::Array(inlinks));
        file.insert(
            "tasks".to_string(),
            Value::Array(
                document
                    .tasks
                    .iter()
                    .map(|task| Value::Object(Self::task_object(path, task)))
                    .collect(),
            ),
        );
        if let Some(day) = temporal::parse_date_literal(file_stem(path)) {
            file.insert("day".to_string(), Value::Date(day));
        }

        page.insert("file".to_string(), Value::Object(file));
        page
    }
}

impl LinkHandler for MemoryCorpus {
    fn resolve(&self, path: &str) -> Option<Object> {
        self.documents
            .get(&self.normalize(path))
            .map(|document| self.build_page(document))
    }

    /// Exact path, then the path with `.md`, then a unique file-name match.
    fn normalize(&self, path: &str) -> String {
        let path = path.trim().trim_start_matches('/');
        if self.documents.contains_key(path) {
            return path.to_string();
        }

        let with_ext = format!("{}.md", path);
        if self.documents.contains_key(&with_ext) {
            return with_ext;
        }

        if let Some(candidates) = self.names.get(&file_stem(path).to_lowercase())
            && candidates.len() == 1
            && let Some(only) = candidates.first()
        {
            return only.clone();
        }
        path.to_string()
    }

    fn exists(&self, path: &str) -> bool {
        self.documents.contains_key(&self.normalize(path))
    }
}

impl Corpus for MemoryCorpus {
    fn all_paths(&self) -> BTreeSet<String> {
        self.documents.keys().cloned().collect()
    }

    fn tagged(&self, tag: &str) -> BTreeSet<String> {
        let wanted = with_hash(tag).to_lowercase();
        let nested = format!("{}/", wanted);
        self.documents
            .values()
            .filter(|document| {
                document.tags.iter().any(|t| {
                    let t = with_hash(t).to_lowercase();
                    t == wanted || t.starts_with(&nested)
                })
            })
            .map(|document| document.path.clone())
            .collect()
    }

    fn in_folder(&self, folder: &str) -> BTreeSet<String> {
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            return self.all_paths();
        }
        let prefix = format!("{}/", folder);
        let file = format!("{}.md", folder);
        self.documents
            .keys()
            .filter(|path| path.starts_with(&prefix) || *path == folder || **path == file)
            .cloned()
            .collect()
    }

    fn incoming(&self, path: &str) -> BTreeSet<String> {
        Self::linked(&self.link_index().incoming, &self.normalize(path))
    }

    fn outgoing(&self, path: &str) -> BTreeSet<String> {
        Self::linked(&self.link_index().outgoing, &self.normalize(path))
    }
}
