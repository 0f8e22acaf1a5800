//! whole-image conversion
//!
//! a conversion runs these phases in order, each blocking until done:
//!
//! 1. untar the source archive into `<name>/orig` (skipped if present)
//! 2. load `manifest.json`, `repositories` and the image config
//! 3. unpack every layer into `<name>/temp`
//! 4. convert and repack every layer into `<name>/lazy`, collecting diff ids
//! 5. write the new config, `repositories` and `manifest.json`
//! 6. archive `<name>/lazy` into `<name>-lazy.tar`

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::fs::{copy_file, ensure_dir, fresh_dir, remove_path, write_file, write_json_line, WorkLock};
use crate::hash::hash_bytes;
use crate::layer::{Layer, UnpackedLayer};
use crate::pool::ContentPool;
use crate::types::{ensure_tag, rekey_tag, ImageConfig, ImageManifest, RepoTag, Repositories};

/// suffix a source archive must carry
pub const ARCHIVE_SUFFIX: &str = ".tar";

/// per-layer files copied unchanged from the source image
const SIDECARS: [&str; 2] = ["VERSION", "json"];

const MANIFEST_FILE: &str = "manifest.json";
const REPOSITORIES_FILE: &str = "repositories";

/// outcome of a successful conversion
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// the converted image archive
    pub output: PathBuf,
    /// file name of the rewritten config, `<sha256 hex>.json`
    pub config_name: String,
    /// diff ids in manifest layer order
    pub diff_ids: Vec<String>,
    /// rewritten repo tags
    pub repo_tags: Vec<String>,
    /// blobs this conversion added to the pool
    pub new_blobs: usize,
}

/// documents and layers read from the extracted source image
struct LoadedImage {
    manifest: Vec<ImageManifest>,
    repositories: Repositories,
    config: ImageConfig,
    tags: Vec<RepoTag>,
    layers: Vec<Layer>,
}

/// one source archive and the locations its conversion works in
pub struct Image<'a> {
    name: String,
    source: PathBuf,
    work: PathBuf,
    target: PathBuf,
    config: &'a Config,
}

impl<'a> Image<'a> {
    /// set up a conversion of `source`, which must be named `<name>.tar`
    ///
    /// nothing is touched on disk until [`Image::convert`] runs.
    pub fn new(source: &Path, config: &'a Config) -> Result<Self> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(ARCHIVE_SUFFIX))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidArchiveName(source.to_path_buf()))?
            .to_string();

        let base = match &config.work_dir {
            Some(dir) => dir.clone(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        Ok(Self {
            work: base.join(&name),
            target: base.join(format!("{}-lazy{}", name, ARCHIVE_SUFFIX)),
            source: source.to_path_buf(),
            name,
            config,
        })
    }

    /// name derived from the archive file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// per-image work directory
    pub fn work_path(&self) -> &Path {
        &self.work
    }

    /// where the extracted source image lives
    pub fn src_path(&self) -> PathBuf {
        self.work.join("orig")
    }

    /// where the converted image is assembled
    pub fn dst_path(&self) -> PathBuf {
        self.work.join("lazy")
    }

    /// where layers are unpacked while converting
    pub fn tmp_path(&self) -> PathBuf {
        self.work.join("temp")
    }

    /// the converted image archive
    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// run every conversion phase
    pub fn convert(&self) -> Result<ConversionReport> {
        ensure_dir(&self.work)?;
        let _lock = WorkLock::acquire(&self.work.join(".lock"))?;

        self.untar()?;
        let mut image = self.load_manifest()?;

        let pool = ContentPool::open(&self.config.pool)?;

        let unpacked = self.unpack_layers(&image.layers)?;
        let diff_ids = self.assemble_layers(&image.layers, &unpacked, &mut image.config, &pool)?;
        let (config_name, repo_tags) = self.write_configs(&mut image)?;
        self.assemble_target()?;

        let new_blobs = pool.inserted();
        tracing::info!(
            output = %self.target.display(),
            layers = diff_ids.len(),
            new_blobs,
            "conversion complete"
        );

        Ok(ConversionReport {
            output: self.target.clone(),
            config_name,
            diff_ids,
            repo_tags,
            new_blobs,
        })
    }

    fn untar(&self) -> Result<()> {
        let src = self.src_path();
        tracing::info!(archive = %self.source.display(), "untaring");

        if !ensure_dir(&src)? {
            tracing::info!(
                path = %src.display(),
                "directory already exists, skipping untar"
            );
            return Ok(());
        }

        match archive::extract(&self.source, &src) {
            Ok(()) => Ok(()),
            Err(e) if !self.config.strict_extract => {
                tracing::warn!(error = %e, "failed to untar, continuing with partial extraction");
                Ok(())
            }
            Err(e) => {
                // a partial tree would otherwise be reused as a cache on the next run
                remove_path(&src)?;
                Err(e)
            }
        }
    }

    fn load_manifest(&self) -> Result<LoadedImage> {
        let src = self.src_path();

        let manifest_path = src.join(MANIFEST_FILE);
        let bytes = std::fs::read(&manifest_path).with_path(&manifest_path)?;
        let manifest = ImageManifest::from_slice(&bytes)?;
        let record = manifest.first().ok_or(Error::EmptyManifest)?;

        let repositories_path = src.join(REPOSITORIES_FILE);
        let repositories: Repositories = match std::fs::read(&repositories_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no repositories file, image is untagged");
                Repositories::new()
            }
            Err(e) => return Err(e).with_path(&repositories_path),
        };

        let config = ImageConfig::load(&src.join(&record.config))?;

        let tags = record
            .tags()
            .iter()
            .map(|tag| RepoTag::parse(tag))
            .collect::<Result<Vec<_>>>()?;
        let mut seen_tags = HashSet::new();
        for tag in &tags {
            if !seen_tags.insert(tag.to_string()) {
                return Err(Error::DuplicateRepoTag(tag.to_string()));
            }
            ensure_tag(&repositories, tag)?;
        }

        let mut seen = HashSet::new();
        let mut layers = Vec::with_capacity(record.layers.len());
        for path in &record.layers {
            let layer = Layer::new(src.join(path))?;
            if !seen.insert(layer.id().to_string()) {
                return Err(Error::DuplicateLayerId(layer.id().to_string()));
            }
            layers.push(layer);
        }

        tracing::info!(repo_tags = ?record.tags(), layers = layers.len(), "parse manifest success");

        Ok(LoadedImage {
            manifest,
            repositories,
            config,
            tags,
            layers,
        })
    }

    fn unpack_layers(&self, layers: &[Layer]) -> Result<Vec<UnpackedLayer>> {
        let tmp = self.tmp_path();
        fresh_dir(&tmp)?;
        layers.iter().map(|layer| layer.unpack(&tmp)).collect()
    }

    fn assemble_layers(
        &self,
        layers: &[Layer],
        unpacked: &[UnpackedLayer],
        config: &mut ImageConfig,
        pool: &ContentPool,
    ) -> Result<Vec<String>> {
        let dst = self.dst_path();
        fresh_dir(&dst)?;
        config.clear_diff_ids()?;

        let mut diff_ids = Vec::with_capacity(unpacked.len());
        for (source, layer) in layers.iter().zip(unpacked) {
            layer.convert(&self.config.metadata_name, pool)?;
            let packed = layer.pack(&dst)?;
            let diff_id = packed.diff_id()?;
            config.push_diff_id(diff_id.clone())?;
            tracing::info!(id = layer.id(), %diff_id, "assembled layer");

            let src_dir = source
                .path()
                .parent()
                .ok_or_else(|| Error::InvalidLayerPath(source.path().to_path_buf()))?;
            let dst_dir = dst.join(layer.id());
            for sidecar in SIDECARS {
                copy_file(&src_dir.join(sidecar), &dst_dir.join(sidecar))?;
            }

            diff_ids.push(diff_id);
        }
        Ok(diff_ids)
    }

    /// write the config, `repositories` and `manifest.json`; returns the new
    /// config name and the rewritten tags
    fn write_configs(&self, image: &mut LoadedImage) -> Result<(String, Vec<String>)> {
        let dst = self.dst_path();

        let bytes = image.config.to_canonical_bytes()?;
        let config_name = format!("{}.json", hash_bytes(&bytes).to_hex());
        write_file(&dst.join(&config_name), &bytes)?;

        let mut repo_tags = Vec::with_capacity(image.tags.len());
        for tag in &image.tags {
            let lazy = tag.with_suffix(&self.config.tag_suffix);
            rekey_tag(&mut image.repositories, tag, &lazy)?;
            repo_tags.push(lazy.to_string());
        }

        let record = image.manifest.first_mut().ok_or(Error::EmptyManifest)?;
        record.config = config_name.clone();
        record.set_tags(repo_tags.clone());

        write_json_line(&dst.join(REPOSITORIES_FILE), &image.repositories)?;
        write_json_line(&dst.join(MANIFEST_FILE), &image.manifest)?;
        tracing::info!(config = %config_name, repo_tags = ?repo_tags, "wrote image configs");

        Ok((config_name, repo_tags))
    }

    fn assemble_target(&self) -> Result<()> {
        tracing::info!(target = %self.target.display(), "assembling image archive");
        archive::pack_dir(&self.dst_path(), &self.target)
    }
}

/// convert the image archive at `source` with the given settings
pub fn convert_image(source: &Path, config: &Config) -> Result<ConversionReport> {
    Image::new(source, config)?.convert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash_file, Hash};
    use crate::types::Dirent;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::{tempdir, TempDir};

    const CONFIG_DOC: &str = r#"{"architecture":"amd64","os":"linux","config":{"Env":["PATH=/bin"]},"rootfs":{"type":"layers","diff_ids":["sha256:old1","sha256:old2"]}}"#;

    /// what goes into one fixture layer
    enum Node {
        File(&'static str, &'static str),
        Link(&'static str, &'static str),
    }

    struct Fixture {
        dir: TempDir,
        tarball: PathBuf,
        config: Config,
    }

    impl Fixture {
        fn pool(&self) -> ContentPool {
            ContentPool::open(&self.config.pool).unwrap()
        }

        fn image(&self) -> Image<'_> {
            Image::new(&self.tarball, &self.config).unwrap()
        }

        fn metadata(&self, id: &str) -> Dirent {
            let layer_tar = self.image().dst_path().join(id).join("layer.tar");
            let doc = archive::read_entry(&layer_tar, "metadata.json")
                .unwrap()
                .unwrap();
            serde_json::from_slice(&doc).unwrap()
        }
    }

    /// build a `docker save` style archive named `<name>.tar`
    fn build_image(
        root: &Path,
        name: &str,
        layers: &[(&str, &[Node])],
        manifest: serde_json::Value,
        repositories: serde_json::Value,
    ) -> PathBuf {
        let src = root.join(format!("{}-src", name));
        fs::create_dir_all(&src).unwrap();

        for (id, nodes) in layers {
            let tree = root.join(format!("{}-{}-tree", name, id));
            fs::create_dir_all(&tree).unwrap();
            for node in nodes.iter() {
                match node {
                    Node::File(path, content) => {
                        let p = tree.join(path);
                        fs::create_dir_all(p.parent().unwrap()).unwrap();
                        fs::write(p, content).unwrap();
                    }
                    Node::Link(path, target) => symlink(target, tree.join(path)).unwrap(),
                }
            }
            let layer_dir = src.join(id);
            fs::create_dir_all(&layer_dir).unwrap();
            archive::pack_dir(&tree, &layer_dir.join("layer.tar")).unwrap();
            fs::write(layer_dir.join("VERSION"), "1.0").unwrap();
            fs::write(layer_dir.join("json"), format!("{{\"id\":\"{}\"}}", id)).unwrap();
        }

        fs::write(src.join("cfg.json"), CONFIG_DOC).unwrap();
        fs::write(src.join("manifest.json"), manifest.to_string()).unwrap();
        fs::write(src.join("repositories"), repositories.to_string()).unwrap();

        let tarball = root.join(format!("{}.tar", name));
        archive::pack_dir(&src, &tarball).unwrap();
        tarball
    }

    fn two_layer_fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let layers: [(&str, &[Node]); 2] = [
            ("layera", &[Node::File("a.txt", "hello")]),
            (
                "layerb",
                &[Node::File("b.txt", "hello"), Node::Link("c", "/a.txt")],
            ),
        ];
        let tarball = build_image(
            dir.path(),
            "myimage",
            &layers,
            serde_json::json!([{
                "Config": "cfg.json",
                "RepoTags": ["myimage:1.0"],
                "Layers": ["layera/layer.tar", "layerb/layer.tar"]
            }]),
            serde_json::json!({"myimage": {"1.0": "layerb"}}),
        );
        let config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));
        Fixture {
            dir,
            tarball,
            config,
        }
    }

    #[test]
    fn test_image_paths() {
        let config = Config::default();
        let image = Image::new(Path::new("/images/app.tar"), &config).unwrap();

        assert_eq!(image.name(), "app");
        assert_eq!(image.work_path(), Path::new("/images/app"));
        assert_eq!(image.src_path(), PathBuf::from("/images/app/orig"));
        assert_eq!(image.dst_path(), PathBuf::from("/images/app/lazy"));
        assert_eq!(image.tmp_path(), PathBuf::from("/images/app/temp"));
        assert_eq!(image.target_path(), Path::new("/images/app-lazy.tar"));

        let config = Config::default().with_work_dir("/work");
        let image = Image::new(Path::new("/images/app.tar"), &config).unwrap();
        assert_eq!(image.target_path(), Path::new("/work/app-lazy.tar"));
    }

    #[test]
    fn test_image_requires_tar_suffix() {
        let config = Config::default();
        for bad in ["/images/app.tgz", "/images/app", "/images/.tar"] {
            assert!(matches!(
                Image::new(Path::new(bad), &config),
                Err(Error::InvalidArchiveName(_))
            ));
        }
    }

    #[test]
    fn test_shared_content_is_pooled_once() {
        let fx = two_layer_fixture();
        fx.image().convert().unwrap();

        let hello = hash_bytes(b"hello");
        assert_eq!(fx.pool().list().unwrap(), vec![hello]);

        let a = fx.metadata("layera");
        assert_eq!(a.get("a.txt").unwrap().hash(), Some(&hello));

        let b = fx.metadata("layerb");
        assert_eq!(b.get("b.txt").unwrap().hash(), Some(&hello));
        match b.get("c").unwrap() {
            Dirent::Symlink { link, .. } => assert_eq!(link, "/a.txt"),
            other => panic!("expected symlink, got {}", other.type_name()),
        }
        assert_eq!(b.get("c").unwrap().hash(), None);
    }

    #[test]
    fn test_diff_ids_follow_manifest_order() {
        let dir = tempdir().unwrap();
        // manifest order deliberately differs from name order
        let layers: [(&str, &[Node]); 3] = [
            ("zzz", &[Node::File("1", "one")]),
            ("aaa", &[Node::File("2", "two")]),
            ("mmm", &[Node::File("3", "three")]),
        ];
        let tarball = build_image(
            dir.path(),
            "ordered",
            &layers,
            serde_json::json!([{
                "Config": "cfg.json",
                "RepoTags": [],
                "Layers": ["zzz/layer.tar", "aaa/layer.tar", "mmm/layer.tar"]
            }]),
            serde_json::json!({}),
        );
        let config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));

        let image = Image::new(&tarball, &config).unwrap();
        let report = image.convert().unwrap();

        let expected: Vec<String> = ["zzz", "aaa", "mmm"]
            .iter()
            .map(|id| {
                hash_file(&image.dst_path().join(id).join("layer.tar"))
                    .unwrap()
                    .digest_string()
            })
            .collect();
        assert_eq!(report.diff_ids, expected);

        let written = ImageConfig::load(&image.dst_path().join(&report.config_name)).unwrap();
        let ids: Vec<&str> = written
            .diff_ids()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_tags_rewritten() {
        let fx = two_layer_fixture();
        let report = fx.image().convert().unwrap();
        assert_eq!(report.repo_tags, vec!["myimage:1.0-lazy"]);

        let dst = fx.image().dst_path();
        let repos: Repositories =
            serde_json::from_slice(&fs::read(dst.join("repositories")).unwrap()).unwrap();
        assert!(!repos["myimage"].contains_key("1.0"));
        assert_eq!(repos["myimage"]["1.0-lazy"], "layerb");

        let manifest_text = fs::read_to_string(dst.join("manifest.json")).unwrap();
        assert!(manifest_text.ends_with("]\n"));
        let manifest = ImageManifest::from_slice(manifest_text.as_bytes()).unwrap();
        assert_eq!(manifest[0].tags(), ["myimage:1.0-lazy".to_string()]);
        assert_eq!(manifest[0].config, report.config_name);
        assert_eq!(manifest[0].layers, vec!["layera/layer.tar", "layerb/layer.tar"]);
    }

    #[test]
    fn test_config_named_by_its_hash() {
        let fx = two_layer_fixture();
        let report = fx.image().convert().unwrap();

        let path = fx.image().dst_path().join(&report.config_name);
        let rehashed = hash_file(&path).unwrap();
        assert_eq!(format!("{}.json", rehashed.to_hex()), report.config_name);

        // untouched fields survive
        let written = ImageConfig::load(&path).unwrap();
        assert_eq!(written.as_value()["config"]["Env"][0], "PATH=/bin");
        assert_eq!(written.diff_ids().unwrap().len(), 2);
    }

    #[test]
    fn test_sidecars_copied() {
        let fx = two_layer_fixture();
        fx.image().convert().unwrap();

        let dst = fx.image().dst_path();
        for id in ["layera", "layerb"] {
            assert_eq!(fs::read_to_string(dst.join(id).join("VERSION")).unwrap(), "1.0");
            assert_eq!(
                fs::read_to_string(dst.join(id).join("json")).unwrap(),
                format!("{{\"id\":\"{}\"}}", id)
            );
        }
    }

    #[test]
    fn test_output_archive_shape() {
        let fx = two_layer_fixture();
        let report = fx.image().convert().unwrap();

        assert!(report.output.is_file());
        let out = fx.dir.path().join("unpacked-output");
        fs::create_dir(&out).unwrap();
        archive::extract(&report.output, &out).unwrap();

        let mut names: Vec<String> = walkdir::WalkDir::new(&out)
            .min_depth(1)
            .into_iter()
            .map(|e| {
                e.unwrap()
                    .path()
                    .strip_prefix(&out)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();

        let mut expected = vec![
            report.config_name.clone(),
            "layera".to_string(),
            "layera/VERSION".to_string(),
            "layera/json".to_string(),
            "layera/layer.tar".to_string(),
            "layerb".to_string(),
            "layerb/VERSION".to_string(),
            "layerb/json".to_string(),
            "layerb/layer.tar".to_string(),
            "manifest.json".to_string(),
            "repositories".to_string(),
        ];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_reconversion_adds_no_blobs() {
        let fx = two_layer_fixture();
        let first = fx.image().convert().unwrap();
        assert_eq!(first.new_blobs, 1);

        // another writer sharing the pool does not count toward this conversion
        fx.pool().put(&mut &b"foreign"[..]).unwrap();

        let second = fx.image().convert().unwrap();
        assert_eq!(second.new_blobs, 0);
        assert_eq!(fx.pool().list().unwrap().len(), 2);

        // same input, same output
        assert_eq!(first.config_name, second.config_name);
        assert_eq!(first.diff_ids, second.diff_ids);
    }

    #[test]
    fn test_images_share_pool() {
        let fx = two_layer_fixture();
        fx.image().convert().unwrap();

        let layers: [(&str, &[Node]); 1] =
            [("other", &[Node::File("greeting", "hello"), Node::File("new", "bytes")])];
        let tarball = build_image(
            fx.dir.path(),
            "second",
            &layers,
            serde_json::json!([{
                "Config": "cfg.json",
                "RepoTags": ["second:latest"],
                "Layers": ["other/layer.tar"]
            }]),
            serde_json::json!({"second": {"latest": "other"}}),
        );

        let report = convert_image(&tarball, &fx.config).unwrap();
        assert_eq!(report.new_blobs, 1);

        let pooled = fx.pool().list().unwrap();
        assert_eq!(pooled.len(), 2);
        assert!(pooled.contains(&hash_bytes(b"hello")));
        assert!(pooled.contains(&hash_bytes(b"bytes")));
    }

    #[test]
    fn test_missing_config_key_aborts_early() {
        let dir = tempdir().unwrap();
        let layers: [(&str, &[Node]); 1] = [("only", &[Node::File("f", "data")])];
        let tarball = build_image(
            dir.path(),
            "broken",
            &layers,
            serde_json::json!([{
                "RepoTags": ["broken:1"],
                "Layers": ["only/layer.tar"]
            }]),
            serde_json::json!({"broken": {"1": "only"}}),
        );
        let config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));
        let image = Image::new(&tarball, &config).unwrap();

        let result = image.convert();

        assert!(matches!(
            result,
            Err(Error::MissingField {
                field: "Config",
                ..
            })
        ));
        assert!(!config.pool.exists());
        assert!(!image.dst_path().exists());
        assert!(!image.tmp_path().exists());
        assert!(!image.target_path().exists());
    }

    #[test]
    fn test_unknown_tag_aborts_before_layers() {
        let dir = tempdir().unwrap();
        let layers: [(&str, &[Node]); 1] = [("only", &[Node::File("f", "data")])];
        let tarball = build_image(
            dir.path(),
            "untracked",
            &layers,
            serde_json::json!([{
                "Config": "cfg.json",
                "RepoTags": ["untracked:2"],
                "Layers": ["only/layer.tar"]
            }]),
            serde_json::json!({"untracked": {"1": "only"}}),
        );
        let config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));
        let image = Image::new(&tarball, &config).unwrap();

        assert!(matches!(image.convert(), Err(Error::TagNotFound(_))));
        assert!(!image.dst_path().exists());
    }

    #[test]
    fn test_duplicate_tags_rejected_before_layers() {
        let dir = tempdir().unwrap();
        let layers: [(&str, &[Node]); 1] = [("only", &[Node::File("f", "data")])];
        let tarball = build_image(
            dir.path(),
            "twice",
            &layers,
            serde_json::json!([{
                "Config": "cfg.json",
                "RepoTags": ["twice:1", "twice:1"],
                "Layers": ["only/layer.tar"]
            }]),
            serde_json::json!({"twice": {"1": "only"}}),
        );
        let config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));
        let image = Image::new(&tarball, &config).unwrap();

        assert!(matches!(
            image.convert(),
            Err(Error::DuplicateRepoTag(tag)) if tag == "twice:1"
        ));
        assert!(!config.pool.exists());
        assert!(!image.dst_path().exists());
    }

    #[test]
    fn test_duplicate_layer_ids_rejected() {
        let dir = tempdir().unwrap();
        let layers: [(&str, &[Node]); 1] = [("same", &[Node::File("f", "data")])];
        let tarball = build_image(
            dir.path(),
            "dupes",
            &layers,
            serde_json::json!([{
                "Config": "cfg.json",
                "RepoTags": [],
                "Layers": ["same/layer.tar", "same/layer.tar"]
            }]),
            serde_json::json!({}),
        );
        let config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));

        assert!(matches!(
            convert_image(&tarball, &config),
            Err(Error::DuplicateLayerId(id)) if id == "same"
        ));
    }

    #[test]
    fn test_corrupt_source_strict() {
        let dir = tempdir().unwrap();
        let tarball = dir.path().join("corrupt.tar");
        fs::write(&tarball, vec![0xffu8; 4096]).unwrap();
        let config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));
        let image = Image::new(&tarball, &config).unwrap();

        assert!(matches!(image.convert(), Err(Error::Archive { .. })));
        // no half-extracted cache left behind
        assert!(!image.src_path().exists());
    }

    #[test]
    fn test_corrupt_source_lenient() {
        let dir = tempdir().unwrap();
        let tarball = dir.path().join("corrupt.tar");
        fs::write(&tarball, vec![0xffu8; 4096]).unwrap();
        let mut config = Config::default()
            .with_pool(dir.path().join("pool"))
            .with_work_dir(dir.path().join("work"));
        config.strict_extract = false;
        let image = Image::new(&tarball, &config).unwrap();

        // extraction failure is logged, then the missing manifest stops the run
        assert!(matches!(image.convert(), Err(Error::Io { .. })));
        assert!(image.src_path().is_dir());
    }

    #[test]
    fn test_existing_extraction_is_reused() {
        let fx = two_layer_fixture();
        fx.image().convert().unwrap();

        // the cached tree is used even though the archive is gone
        fs::remove_file(&fx.tarball).unwrap();
        fx.image().convert().unwrap();
    }

    #[test]
    fn test_concurrent_conversion_is_refused() {
        let fx = two_layer_fixture();
        let image = fx.image();
        fs::create_dir_all(image.work_path()).unwrap();
        let _held = WorkLock::acquire(&image.work_path().join(".lock")).unwrap();

        assert!(matches!(image.convert(), Err(Error::LockContention(_))));
    }

    #[test]
    fn test_custom_suffix_and_metadata_name() {
        let mut fx = two_layer_fixture();
        fx.config.tag_suffix = "-ondemand".to_string();
        fx.config.metadata_name = "tree.json".to_string();

        let report = fx.image().convert().unwrap();
        assert_eq!(report.repo_tags, vec!["myimage:1.0-ondemand"]);

        let layer_tar = fx.image().dst_path().join("layera/layer.tar");
        let doc = archive::read_entry(&layer_tar, "tree.json").unwrap().unwrap();
        let tree: Dirent = serde_json::from_slice(&doc).unwrap();
        assert!(tree.get("a.txt").is_some());
    }

    #[test]
    fn test_report_hash_type() {
        let fx = two_layer_fixture();
        let report = fx.image().convert().unwrap();
        let hex = report.config_name.strip_suffix(".json").unwrap();
        assert!(Hash::from_hex(hex).is_ok());
    }
}
