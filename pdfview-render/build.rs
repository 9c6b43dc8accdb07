use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use ureq::AgentBuilder;
use walkdir::WalkDir;

const DEFAULT_PDFIUM_RELEASE: &str = "chromium/7350";
const DEFAULT_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    for var in [
        "PDFVIEW_PDFIUM_SKIP_DOWNLOAD",
        "PDFVIEW_PDFIUM_ARCHIVE_PATH",
        "PDFVIEW_PDFIUM_RELEASE",
        "PDFVIEW_PDFIUM_PLATFORM",
        "PDFVIEW_PDFIUM_BASE_URL",
        "PDFIUM_DYNAMIC_LIB_PATH",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    if env::var_os("PDFVIEW_PDFIUM_SKIP_DOWNLOAD").is_some()
        || env::var_os("PDFIUM_DYNAMIC_LIB_PATH").is_some()
    {
        return Ok(());
    }

    // Offline builds still succeed; the provider then looks for a library
    // next to the binary or installed system-wide.
    if let Err(err) = stage_library() {
        println!("cargo:warning=pdfium was not bundled: {err:#}");
    }
    Ok(())
}

fn stage_library() -> Result<()> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR env var not set")?);
    let staging_dir = out_dir.join("pdfium");
    fs::create_dir_all(&staging_dir).context("failed to create staging directory")?;

    let target_os = env::var("CARGO_CFG_TARGET_OS").context("CARGO_CFG_TARGET_OS missing")?;
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").context("CARGO_CFG_TARGET_ARCH missing")?;

    if let Some(path) = locate_library(&staging_dir, &target_os) {
        return announce(&path);
    }

    let archive = match env::var_os("PDFVIEW_PDFIUM_ARCHIVE_PATH") {
        Some(path) => PathBuf::from(path),
        None => {
            let platform = env::var("PDFVIEW_PDFIUM_PLATFORM")
                .unwrap_or_else(|_| platform_name(&target_os, &target_arch));
            download(&staging_dir, &platform)?
        }
    };

    let file = File::open(&archive).with_context(|| format!("failed to open {archive:?}"))?;
    Archive::new(GzDecoder::new(file))
        .unpack(&staging_dir)
        .with_context(|| format!("failed to unpack {archive:?}"))?;

    let library = locate_library(&staging_dir, &target_os)
        .ok_or_else(|| anyhow!("no pdfium library in {staging_dir:?} after extraction"))?;
    announce(&library)
}

/// Hands the library location to the crate through `option_env!`.
fn announce(path: &Path) -> Result<()> {
    let path = path
        .to_str()
        .ok_or_else(|| anyhow!("library path {path:?} is not UTF-8"))?;
    println!("cargo:rustc-env=PDFVIEW_PDFIUM_LIBRARY_PATH={path}");
    Ok(())
}

fn platform_name(target_os: &str, target_arch: &str) -> String {
    let os = match target_os {
        "macos" => "mac",
        other => other,
    };
    let arch = match target_arch {
        "aarch64" => "arm64",
        "x86_64" => "x64",
        other => other,
    };
    format!("{os}-{arch}")
}

fn locate_library(root: &Path, target_os: &str) -> Option<PathBuf> {
    let wanted = match target_os {
        "windows" => "pdfium.dll",
        "macos" => "libpdfium.dylib",
        _ => "libpdfium.so",
    };
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == wanted)
        .map(|entry| entry.into_path())
}

fn download(staging_dir: &Path, platform: &str) -> Result<PathBuf> {
    let release =
        env::var("PDFVIEW_PDFIUM_RELEASE").unwrap_or_else(|_| DEFAULT_PDFIUM_RELEASE.to_owned());
    let base_url =
        env::var("PDFVIEW_PDFIUM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
    let filename = format!("pdfium-{platform}.tgz");
    let destination = staging_dir.join(&filename);
    if destination.exists() {
        return Ok(destination);
    }

    let url = format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        release.trim_matches('/'),
        filename
    );
    let agent = AgentBuilder::new()
        .timeout_read(Duration::from_secs(120))
        .build();
    let response = agent
        .get(&url)
        .call()
        .map_err(|err| anyhow!("GET {url} failed: {err}"))?;

    let partial = destination.with_extension("part");
    let mut file =
        File::create(&partial).with_context(|| format!("failed to create {partial:?}"))?;
    io::copy(&mut response.into_reader(), &mut file)
        .with_context(|| format!("failed to write {partial:?}"))?;
    fs::rename(&partial, &destination)
        .with_context(|| format!("failed to move {partial:?} into place"))?;
    Ok(destination)
}
