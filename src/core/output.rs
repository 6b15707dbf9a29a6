//! GI-008: Output directory management.
//!
//! A synthesis is written to a staging directory next to the target and then
//! swapped in with renames, so a reader of the output directory sees either
//! the previous complete output or the new one.

use super::error::{Result, SynthError};
use super::synth::SynthOutput;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUT_DIR: &str = "cdktf.out";
pub const MANIFEST_FILE: &str = "manifest.json";

/// `<out>/stacks/<id>/cdk.tf.json`
pub fn stack_file_path(out_dir: &Path, stack_id: &str) -> PathBuf {
    out_dir.join("stacks").join(stack_id).join("cdk.tf.json")
}

pub fn manifest_path(out_dir: &Path) -> PathBuf {
    out_dir.join(MANIFEST_FILE)
}

/// Load a previous manifest. Returns None if there is none.
pub fn load_manifest(out_dir: &Path) -> Result<Option<Value>> {
    let path = manifest_path(out_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let manifest = serde_json::from_str(&content)
        .map_err(|e| SynthError::Output(format!("invalid manifest {}: {}", path.display(), e)))?;
    Ok(Some(manifest))
}

/// Hash recorded for a stack in a previous manifest.
pub fn previous_hash<'a>(manifest: &'a Value, stack_id: &str) -> Option<&'a str> {
    manifest["stacks"][stack_id]["hash"].as_str()
}

/// Write every stack document plus the manifest, replacing `out_dir`.
pub fn write_atomic(out_dir: &Path, output: &SynthOutput) -> Result<()> {
    let staging = sibling(out_dir, "staging")?;
    let retired = sibling(out_dir, "old")?;
    for stale in [&staging, &retired] {
        if stale.exists() {
            std::fs::remove_dir_all(stale)?;
        }
    }
    if let Some(parent) = out_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if let Err(e) = stage(&staging, output) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    swap_into_place(&staging, out_dir, &retired)?;
    tracing::info!(out = %out_dir.display(), stacks = output.stacks.len(), "output written");
    Ok(())
}

/// Move `out_dir` aside, move `staging` in, drop the old copy. If the second
/// rename fails the old output is moved back.
fn swap_into_place(staging: &Path, out_dir: &Path, retired: &Path) -> Result<()> {
    let had_previous = out_dir.exists();
    if had_previous {
        std::fs::rename(out_dir, retired).map_err(|e| rename_error(out_dir, retired, e))?;
    }
    if let Err(e) = std::fs::rename(staging, out_dir) {
        if had_previous {
            if let Err(restore) = std::fs::rename(retired, out_dir) {
                tracing::error!(
                    retired = %retired.display(),
                    error = %restore,
                    "previous output could not be restored"
                );
            }
        }
        let _ = std::fs::remove_dir_all(staging);
        return Err(rename_error(staging, out_dir, e));
    }
    if retired.exists() {
        std::fs::remove_dir_all(retired)?;
    }
    Ok(())
}

fn rename_error(from: &Path, to: &Path, e: std::io::Error) -> SynthError {
    SynthError::Output(format!(
        "cannot rename {} -> {}: {}",
        from.display(),
        to.display(),
        e
    ))
}

fn stage(dir: &Path, output: &SynthOutput) -> Result<()> {
    for stack in &output.stacks {
        let path = stack_file_path(dir, &stack.id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &stack.document)?;
        tracing::debug!(path = %path.display(), "staged");
    }
    let mut manifest = serde_json::to_string_pretty(&output.manifest())?;
    manifest.push('\n');
    std::fs::write(manifest_path(dir), manifest)?;
    Ok(())
}

/// `.<name>.<suffix>` next to `out_dir`.
fn sibling(out_dir: &Path, suffix: &str) -> Result<PathBuf> {
    let name = out_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SynthError::Output(format!("output path has no directory name: {}", out_dir.display()))
        })?;
    Ok(out_dir.with_file_name(format!(".{}.{}", name, suffix)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synth::SynthesizedStack;

    fn stack(id: &str, body: &str) -> SynthesizedStack {
        SynthesizedStack {
            id: id.to_string(),
            document: body.to_string(),
            hash: crate::core::synth::hash_string(body),
            backend: None,
            order: Vec::new(),
            variables: Vec::new(),
            resources: 0,
            data_sources: 0,
        }
    }

    fn output(stacks: Vec<SynthesizedStack>) -> SynthOutput {
        SynthOutput {
            name: "test".to_string(),
            stacks,
        }
    }

    #[test]
    fn test_gi008_stack_file_path() {
        let p = stack_file_path(Path::new("/out"), "container-registry");
        assert_eq!(p, PathBuf::from("/out/stacks/container-registry/cdk.tf.json"));
    }

    #[test]
    fn test_gi008_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdktf.out");
        write_atomic(&out, &output(vec![stack("a", "{}\n"), stack("b", "{\"x\":1}\n")])).unwrap();

        assert_eq!(
            std::fs::read_to_string(stack_file_path(&out, "b")).unwrap(),
            "{\"x\":1}\n"
        );
        let manifest = load_manifest(&out).unwrap().unwrap();
        assert_eq!(manifest["name"], "test");
        assert_eq!(
            previous_hash(&manifest, "a"),
            Some(crate::core::synth::hash_string("{}\n").as_str())
        );
        assert_eq!(previous_hash(&manifest, "ghost"), None);
    }

    #[test]
    fn test_gi008_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_manifest(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_gi008_rewrite_replaces_stale_stacks() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdktf.out");
        write_atomic(&out, &output(vec![stack("old-stack", "{}\n")])).unwrap();
        write_atomic(&out, &output(vec![stack("new-stack", "{}\n")])).unwrap();

        assert!(!stack_file_path(&out, "old-stack").exists());
        assert!(stack_file_path(&out, "new-stack").exists());
        assert!(!dir.path().join(".cdktf.out.staging").exists());
        assert!(!dir.path().join(".cdktf.out.old").exists());
    }

    #[test]
    fn test_gi008_failed_stage_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdktf.out");
        write_atomic(&out, &output(vec![stack("good", "{}\n")])).unwrap();

        // A stack id with a NUL byte cannot become a path.
        let err = write_atomic(&out, &output(vec![stack("bad\0id", "{}\n")]));
        assert!(err.is_err());
        assert!(stack_file_path(&out, "good").exists());
        assert!(!dir.path().join(".cdktf.out.staging").exists());
    }

    #[test]
    fn test_gi008_failed_swap_restores_previous() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdktf.out");
        write_atomic(&out, &output(vec![stack("good", "{}\n")])).unwrap();

        // Staging directory was never created, so moving it in fails.
        let staging = dir.path().join(".cdktf.out.staging");
        let retired = dir.path().join(".cdktf.out.old");
        let err = swap_into_place(&staging, &out, &retired).unwrap_err();
        assert!(err.to_string().contains("cannot rename"));
        assert!(stack_file_path(&out, "good").exists());
        assert!(!retired.exists());
    }

    #[test]
    fn test_gi008_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("deeper").join("out");
        write_atomic(&out, &output(vec![stack("s", "{}\n")])).unwrap();
        assert!(manifest_path(&out).exists());
    }
}
