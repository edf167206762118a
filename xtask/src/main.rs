//! Build automation for homecli
//!
//! Usage: cargo xtask <command>
//!
//! Available commands:
//! - build: Build the project
//! - test: Run tests, optionally the ones that need a k3s node
//! - bundle: Assemble an offline bundle around the release binary
//! - install: Install to system
//! - ci: Run CI checks

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xshell::{cmd, Shell};

const BINARY: &str = "homecli";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for homecli")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build {
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Also run tests that need root or a running k3s cluster
        #[arg(long)]
        cluster: bool,
    },
    /// Assemble an offline bundle: bin/homecli, the k3s archive, the chart,
    /// image tarballs, versions.json and the .bundle marker
    Bundle {
        /// k3s artifact archive (install.sh, k3s, airgap images)
        #[arg(long)]
        k3s: PathBuf,
        /// wekahome chart archive
        #[arg(long)]
        chart: PathBuf,
        /// versions.json describing the bundle
        #[arg(long)]
        manifest: PathBuf,
        /// Directory of image tarballs copied to images/
        #[arg(long)]
        images: Option<PathBuf>,
        /// Target triple (e.g., x86_64-unknown-linux-musl)
        #[arg(long)]
        target: Option<String>,
        /// Output directory
        #[arg(long, default_value = "dist/bundle")]
        out: PathBuf,
    },
    /// Install to system
    Install {
        /// Installation prefix (default: /usr/local)
        #[arg(long, default_value = "/usr/local")]
        prefix: String,
    },
    /// Run CI checks (format, clippy, test)
    Ci,
    /// Format code
    Format {
        /// Check formatting without modifying files
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    sh.change_dir(project_root()?);

    match cli.command {
        Commands::Build { release } => build(&sh, release),
        Commands::Test { cluster } => test(&sh, cluster),
        Commands::Bundle {
            k3s,
            chart,
            manifest,
            images,
            target,
            out,
        } => bundle(
            &sh,
            &BundleInputs {
                k3s,
                chart,
                manifest,
                images,
            },
            target,
            &out,
        ),
        Commands::Install { prefix } => install(&sh, &prefix),
        Commands::Ci => ci(&sh),
        Commands::Format { check } => format(&sh, check),
        Commands::Clippy => clippy(&sh),
    }
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    let profile = if release { "release" } else { "debug" };
    println!("🔨 Building {} ({})", BINARY, profile);
    let release_flag = release.then_some("--release");
    cmd!(sh, "cargo build {release_flag...}").run()?;
    println!("✅ Built target/{}/{}", profile, BINARY);
    Ok(())
}

fn test(sh: &Shell, cluster: bool) -> Result<()> {
    println!("🧪 Running unit and integration tests");
    cmd!(sh, "cargo test --workspace").run()?;
    if cluster {
        // these need root and a running k3s node
        println!("🧪 Running ignored node tests");
        cmd!(sh, "cargo test --workspace -- --ignored").run()?;
    }
    println!("✅ Tests passed");
    Ok(())
}

struct BundleInputs {
    k3s: PathBuf,
    chart: PathBuf,
    manifest: PathBuf,
    images: Option<PathBuf>,
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no file name", path.display()))
}

fn bundle(sh: &Shell, inputs: &BundleInputs, target: Option<String>, out: &Path) -> Result<()> {
    println!("📦 Assembling offline bundle in {}...", out.display());

    for input in [&inputs.k3s, &inputs.chart, &inputs.manifest] {
        if !input.is_file() {
            bail!("{} does not exist", input.display());
        }
    }
    if !file_name(&inputs.chart)?.starts_with("wekahome-") {
        bail!("chart archive must be named wekahome-<version>.tgz");
    }

    let binary_src = match target {
        Some(ref target_triple) => {
            cmd!(sh, "cargo build --release --target {target_triple}").run()?;
            project_root()?.join(format!("target/{}/release/{}", target_triple, BINARY))
        }
        None => {
            cmd!(sh, "cargo build --release").run()?;
            project_root()?.join(format!("target/release/{}", BINARY))
        }
    };

    // homecli resolves the bundle as the parent of its own directory
    sh.create_dir(out.join("bin"))?;
    sh.copy_file(&binary_src, out.join("bin").join(BINARY))?;
    sh.copy_file(&inputs.k3s, out.join(file_name(&inputs.k3s)?))?;
    sh.copy_file(&inputs.chart, out.join(file_name(&inputs.chart)?))?;
    sh.copy_file(&inputs.manifest, out.join("versions.json"))?;

    if let Some(images) = &inputs.images {
        let images_out = out.join("images");
        sh.create_dir(&images_out)?;
        for image in sh.read_dir(images)? {
            if image.is_file() {
                sh.copy_file(&image, &images_out)?;
            }
        }
    }
    sh.write_file(out.join(".bundle"), "")?;

    let version = env!("CARGO_PKG_VERSION");
    let archive_name = format!("{}-bundle-{}.tar.gz", BINARY, version);
    let parent = out.parent().unwrap_or_else(|| Path::new("."));
    let dir = file_name(out)?;
    cmd!(sh, "tar -czf {archive_name} -C {parent} {dir}")
        .run()
        .context("Failed to create tarball")?;

    println!("✅ Bundle created: {}", archive_name);
    Ok(())
}

fn release_binary(sh: &Shell) -> Result<PathBuf> {
    let binary = project_root()?.join("target/release").join(BINARY);
    if !binary.exists() {
        println!("No release binary yet, building it");
        cmd!(sh, "cargo build --release").run()?;
    }
    Ok(binary)
}

fn install(sh: &Shell, prefix: &str) -> Result<()> {
    let binary = release_binary(sh)?;
    let target = Path::new(prefix).join("bin").join(BINARY);
    println!("📥 Installing {} as {}", binary.display(), target.display());

    sh.create_dir(Path::new(prefix).join("bin"))?;
    sh.copy_file(&binary, &target)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))?;
    }

    println!("✅ {} installed", BINARY);
    Ok(())
}

/// Every check CI gates on, in the order it runs them.
fn ci(sh: &Shell) -> Result<()> {
    let steps: [(&str, fn(&Shell) -> Result<()>); 3] = [
        ("rustfmt", |sh| format(sh, true)),
        ("clippy", clippy),
        ("tests", |sh| test(sh, false)),
    ];
    for (name, step) in steps {
        println!("\n🔍 CI step: {}", name);
        step(sh).with_context(|| format!("CI step {} failed", name))?;
    }
    println!("\n✅ CI passed");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    let check_flag = if check { Some("--check") } else { None };
    cmd!(sh, "cargo fmt --all -- {check_flag...}").run()?;
    println!("✅ rustfmt {}", if check { "check passed" } else { "applied" });
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    println!("✅ clippy clean");
    Ok(())
}

fn project_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}
