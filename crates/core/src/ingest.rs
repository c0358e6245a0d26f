use crate::chunking::{split_units, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::extractor::{extract_page_texts, read_text_file};
use crate::models::{FailurePolicy, IngestRun, IngestionOptions, LoadedUnit, SourceMeta};
use crate::traits::VectorIndex;
use crate::IngestError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions loaded as a single plain-text unit.
pub const TEXT_EXTENSIONS: [&str; 8] = ["md", "txt", "cpp", "h", "cs", "js", "py", "glsl"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
}

pub fn classify(path: &Path) -> Option<FileKind> {
    let extension = path.extension().and_then(|ext| ext.to_str())?;

    if extension.eq_ignore_ascii_case("pdf") {
        Some(FileKind::Pdf)
    } else if TEXT_EXTENSIONS
        .iter()
        .any(|known| extension.eq_ignore_ascii_case(known))
    {
        Some(FileKind::Text)
    } else {
        None
    }
}

pub fn discover_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%error, "unable to walk directory entry");
                continue;
            }
        };

        if entry.file_type().is_file() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn load_file(path: &Path, kind: FileKind) -> Result<Vec<LoadedUnit>, IngestError> {
    match kind {
        FileKind::Pdf => Ok(extract_page_texts(path)?
            .into_iter()
            .map(|page| LoadedUnit {
                text: page.text,
                meta: SourceMeta::for_page(path, page.number),
            })
            .collect()),
        FileKind::Text => {
            let text = read_text_file(path)?;
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![LoadedUnit {
                text,
                meta: SourceMeta::for_file(path),
            }])
        }
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Loaded(Vec<LoadedUnit>),
    /// Readable, but there was no text in it.
    Empty,
    Failed(String),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: FileKind,
    pub outcome: FileOutcome,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub files: Vec<FileReport>,
    pub skipped: Vec<PathBuf>,
}

impl LoadReport {
    pub fn units(&self) -> impl Iterator<Item = &LoadedUnit> {
        self.files
            .iter()
            .filter_map(|file| match &file.outcome {
                FileOutcome::Loaded(units) => Some(units),
                FileOutcome::Empty | FileOutcome::Failed(_) => None,
            })
            .flatten()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().filter_map(|file| match &file.outcome {
            FileOutcome::Failed(reason) => Some((file.path.as_path(), reason.as_str())),
            _ => None,
        })
    }

    pub fn empty_files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().filter_map(|file| match file.outcome {
            FileOutcome::Empty => Some(file.path.as_path()),
            _ => None,
        })
    }
}

/// Walks `folder` and loads every recognised file, recording one outcome per file.
pub fn load_directory(folder: &Path) -> Result<LoadReport, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "corpus root is not a directory: {}",
            folder.display()
        )));
    }

    let mut report = LoadReport::default();
    for path in discover_files(folder) {
        let Some(kind) = classify(&path) else {
            debug!(path = %path.display(), "skipping unsupported file");
            report.skipped.push(path);
            continue;
        };

        let outcome = match load_file(&path, kind) {
            Ok(units) if units.is_empty() => FileOutcome::Empty,
            Ok(units) => {
                debug!(path = %path.display(), units = units.len(), "loaded file");
                FileOutcome::Loaded(units)
            }
            Err(error) => FileOutcome::Failed(error.to_string()),
        };
        report.files.push(FileReport {
            path,
            kind,
            outcome,
        });
    }

    if report.files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no supported files found in {}",
            folder.display()
        )));
    }

    Ok(report)
}

#[derive(Debug, Clone)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct IngestionReport {
    pub run: IngestRun,
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    pub failed_files: Vec<FailedFile>,
    pub empty_files: Vec<PathBuf>,
    pub skipped_files: Vec<PathBuf>,
}

/// Loads, chunks, embeds and appends a whole corpus.
///
/// Nothing is written, and with `replace_existing` nothing is cleared, unless
/// every chunk was embedded. Under
/// [`FailurePolicy::Abort`] the first unreadable file stops the run before
/// any embedding happens.
pub async fn ingest_folder<E, V>(
    folder: &Path,
    options: &IngestionOptions,
    embedder: &E,
    store: &V,
) -> Result<IngestionReport, IngestError>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
{
    let config = ChunkingConfig::from(options);
    config.validate()?;

    let load = load_directory(folder)?;
    let failed_files: Vec<FailedFile> = load
        .failures()
        .map(|(path, reason)| FailedFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })
        .collect();

    if options.failure_policy == FailurePolicy::Abort {
        if let Some(first) = failed_files.first() {
            return Err(IngestError::Aborted {
                path: first.path.clone(),
                reason: first.reason.clone(),
            });
        }
    }
    for failed in &failed_files {
        warn!(path = %failed.path.display(), reason = %failed.reason, "skipping unreadable file");
    }

    let units: Vec<LoadedUnit> = load.units().cloned().collect();
    let chunks = split_units(&units, config)?;

    let run = IngestRun::start(embedder.id(), embedder.dimensions());
    info!(
        run_id = %run.run_id,
        embedder = %run.embedder,
        units = units.len(),
        chunks = chunks.len(),
        "embedding chunks"
    );

    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(options.embed_batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        embeddings.extend(embedder.embed_batch(&texts).await?);
    }

    if options.replace_existing {
        store.clear().await?;
    }
    store.append(&run, &chunks, &embeddings).await?;

    let files_indexed = load
        .files
        .iter()
        .filter(|file| matches!(file.outcome, FileOutcome::Loaded(_)))
        .count();

    Ok(IngestionReport {
        run,
        files_indexed,
        chunks_indexed: chunks.len(),
        failed_files,
        empty_files: load.empty_files().map(Path::to_path_buf).collect(),
        skipped_files: load.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::store::LocalVectorStore;
    use crate::RetrievalHit;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    fn write_pdf(path: &Path, pages: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
                "Resources" => Object::Reference(resources_id),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(pages.len() as i64),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path)?;
        Ok(())
    }

    async fn all_hits(
        store: &LocalVectorStore,
        embedder: &CharacterNgramEmbedder,
    ) -> Result<Vec<RetrievalHit>, Box<dyn std::error::Error>> {
        let query = embedder.embed_text("course material");
        Ok(store.search(&query, usize::MAX).await?)
    }

    #[test]
    fn classification_follows_the_allow_list() {
        assert_eq!(classify(Path::new("a/lecture.PDF")), Some(FileKind::Pdf));
        assert_eq!(classify(Path::new("a/shader.glsl")), Some(FileKind::Text));
        assert_eq!(classify(Path::new("a/main.cpp")), Some(FileKind::Text));
        assert_eq!(classify(Path::new("a/readme.md")), Some(FileKind::Text));
        assert_eq!(classify(Path::new("a/image.png")), None);
        assert_eq!(classify(Path::new("a/Makefile")), None);
    }

    #[test]
    fn discover_files_is_recursive_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("week2");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("b.md"), "b")?;
        fs::write(nested.join("a.py"), "a")?;
        fs::write(dir.path().join("a.png"), [0u8, 1, 2])?;

        let files = discover_files(dir.path());
        assert_eq!(files.len(), 3);
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
        Ok(())
    }

    #[test]
    fn units_are_tagged_with_the_walked_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("week1");
        fs::create_dir(&nested)?;
        let path = nested.join("notes.txt");
        fs::write(&path, "Blending combines fragment colors.")?;

        let report = load_directory(dir.path())?;
        let units: Vec<_> = report.units().collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].meta.source_path, path.to_string_lossy());
        assert_eq!(units[0].meta.page, None);
        Ok(())
    }

    #[test]
    fn loading_requires_a_supported_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("photo.jpg"), [0u8])?;

        assert!(load_directory(dir.path()).is_err());
        assert!(load_directory(&dir.path().join("missing")).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn pdf_pages_and_text_files_are_indexed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let corpus = dir.path().join("raw");
        fs::create_dir(&corpus)?;
        write_pdf(
            &corpus.join("lecture.pdf"),
            &[
                "Vertices are transformed first.",
                "Rasterization produces fragments.",
                "Fragments are shaded last.",
            ],
        )?;
        fs::write(corpus.join("notes.txt"), "Plain notes about alpha blending.")?;

        let embedder = CharacterNgramEmbedder::default();
        let store = LocalVectorStore::new(dir.path().join("vectorstore"));
        let report = ingest_folder(&corpus, &IngestionOptions::default(), &embedder, &store).await?;

        assert_eq!(report.files_indexed, 2);
        assert!(report.failed_files.is_empty());

        let hits = all_hits(&store, &embedder).await?;
        let pdf_pages: BTreeSet<_> = hits
            .iter()
            .filter(|hit| hit.chunk.source_path.ends_with("lecture.pdf"))
            .map(|hit| hit.chunk.page)
            .collect();
        assert_eq!(pdf_pages, BTreeSet::from([Some(1), Some(2), Some(3)]));

        let text_chunks: Vec<_> = hits
            .iter()
            .filter(|hit| hit.chunk.source_path.ends_with("notes.txt"))
            .collect();
        assert!(!text_chunks.is_empty());
        assert!(text_chunks.iter().all(|hit| hit.chunk.page.is_none()));
        Ok(())
    }

    #[tokio::test]
    async fn every_accepted_file_yields_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let corpus = dir.path().join("raw");
        fs::create_dir_all(corpus.join("shaders"))?;
        fs::write(corpus.join("syllabus.md"), "# Syllabus\n\nWeekly labs.")?;
        fs::write(corpus.join("lab.py"), "print('hello')\n".repeat(120))?;
        fs::write(corpus.join("shaders/phong.glsl"), "void main() { gl_FragColor = vec4(1.0); }")?;
        fs::write(corpus.join("diagram.png"), [0u8, 159, 146, 150])?;
        fs::write(corpus.join("empty.txt"), "   \n")?;

        let embedder = CharacterNgramEmbedder::default();
        let store = LocalVectorStore::new(dir.path().join("vectorstore"));
        let report = ingest_folder(&corpus, &IngestionOptions::default(), &embedder, &store).await?;

        assert_eq!(report.files_indexed, 3);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(report.empty_files.len(), 1);
        assert_eq!(store.count().await?, report.chunks_indexed);

        let hits = all_hits(&store, &embedder).await?;
        for name in ["syllabus.md", "lab.py", "phong.glsl"] {
            assert!(hits.iter().any(|hit| hit.chunk.source_path.ends_with(name)), "{name}");
        }
        assert!(!hits.iter().any(|hit| hit.chunk.source_path.ends_with("diagram.png")));
        assert!(hits.iter().all(|hit| hit.chunk.text.chars().count() <= 800));
        Ok(())
    }

    #[tokio::test]
    async fn abort_policy_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let corpus = dir.path().join("raw");
        fs::create_dir(&corpus)?;
        fs::write(corpus.join("good.md"), "Readable notes.")?;
        fs::write(corpus.join("bad.txt"), [0x66, 0xff, 0xfe])?;

        let embedder = CharacterNgramEmbedder::default();
        let store = LocalVectorStore::new(dir.path().join("vectorstore"));
        let result = ingest_folder(&corpus, &IngestionOptions::default(), &embedder, &store).await;

        assert!(matches!(result, Err(IngestError::Aborted { ref path, .. }) if path.ends_with("bad.txt")));
        assert_eq!(store.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn skip_policy_reports_failures() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let corpus = dir.path().join("raw");
        fs::create_dir(&corpus)?;
        fs::write(corpus.join("good.md"), "Readable notes.")?;
        fs::write(corpus.join("broken.pdf"), b"%PDF-1.4\n%broken")?;

        let options = IngestionOptions {
            failure_policy: FailurePolicy::SkipAndReport,
            ..IngestionOptions::default()
        };
        let embedder = CharacterNgramEmbedder::default();
        let store = LocalVectorStore::new(dir.path().join("vectorstore"));
        let report = ingest_folder(&corpus, &options, &embedder, &store).await?;

        assert_eq!(report.failed_files.len(), 1);
        assert!(report.failed_files[0].path.ends_with("broken.pdf"));
        assert_eq!(report.files_indexed, 1);
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn text_less_pdf_is_empty_not_a_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let corpus = dir.path().join("raw");
        fs::create_dir(&corpus)?;
        write_pdf(&corpus.join("scanned_slides.pdf"), &["", " "])?;
        fs::write(corpus.join("notes.txt"), "Notes about the depth buffer.")?;

        assert!(load_file(&corpus.join("scanned_slides.pdf"), FileKind::Pdf)?.is_empty());

        let embedder = CharacterNgramEmbedder::default();
        let store = LocalVectorStore::new(dir.path().join("vectorstore"));
        let report = ingest_folder(&corpus, &IngestionOptions::default(), &embedder, &store).await?;

        assert!(report.failed_files.is_empty());
        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.empty_files.len(), 1);
        assert!(report.empty_files[0].ends_with("scanned_slides.pdf"));
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn replacing_keeps_the_old_index_when_the_run_aborts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let first = dir.path().join("week1");
        let second = dir.path().join("week2");
        fs::create_dir(&first)?;
        fs::create_dir(&second)?;
        fs::write(first.join("intro.md"), "Course introduction.")?;
        fs::write(second.join("good.md"), "Week two notes.")?;
        fs::write(second.join("bad.txt"), [0x66, 0xff, 0xfe])?;

        let embedder = CharacterNgramEmbedder::default();
        let store = LocalVectorStore::new(dir.path().join("vectorstore"));
        ingest_folder(&first, &IngestionOptions::default(), &embedder, &store).await?;

        let replace = IngestionOptions {
            replace_existing: true,
            ..IngestionOptions::default()
        };
        let result = ingest_folder(&second, &replace, &embedder, &store).await;

        assert!(matches!(result, Err(IngestError::Aborted { .. })));
        let hits = all_hits(&store, &embedder).await?;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].chunk.source_path.ends_with("intro.md"));
        Ok(())
    }

    #[tokio::test]
    async fn replacing_swaps_the_index_after_a_successful_run() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let first = dir.path().join("week1");
        let second = dir.path().join("week2");
        fs::create_dir(&first)?;
        fs::create_dir(&second)?;
        fs::write(first.join("intro.md"), "Course introduction.")?;
        fs::write(second.join("lighting.md"), "Phong lighting notes.")?;

        let embedder = CharacterNgramEmbedder::default();
        let store = LocalVectorStore::new(dir.path().join("vectorstore"));
        ingest_folder(&first, &IngestionOptions::default(), &embedder, &store).await?;

        let replace = IngestionOptions {
            replace_existing: true,
            ..IngestionOptions::default()
        };
        ingest_folder(&second, &replace, &embedder, &store).await?;

        let hits = all_hits(&store, &embedder).await?;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].chunk.source_path.ends_with("lighting.md"));
        Ok(())
    }
}
