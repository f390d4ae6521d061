//! CLI: type-model manifests → JSON Schema documents
use std::path::PathBuf;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand, Args};
use colored::Colorize;

use crate::config::{GeneratorConfig, NameTag};
use crate::generator::Generator;
use crate::source::ManifestSource;
use crate::writer::Writer;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// derive JSON Schema documents from record descriptors and their validation rules
#[derive(Parser, Debug)]
#[command(name = "schemagen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// write one schema document per emitted record into the output directory
    Generate(GenerateOut),
    /// derive a single record's document and print it
    Show(ShowOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// annotation key that supplies property names
    #[arg(long, value_enum, default_value_t = NameTag::Json)]
    tag: NameTag,

    /// base URL for the `$id` of every document (e.g. https://example.com/schemas)
    #[arg(long)]
    schema_id: Option<String>,

    /// scan input directories recursively
    #[arg(short, long, default_value_t = false)]
    recursive: bool,

    /// debug-level logging (RUST_LOG still wins when set)
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Manifest files, directories holding `*.model.json` files, or quoted glob patterns
    #[arg(default_value = ".")]
    paths: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory for `<name>.schema.json` files
    #[arg(long)]
    output_dir: PathBuf,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ShowOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// record whose document to print
    #[arg(long)]
    record: String,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            name_tag: self.tag,
            schema_id: self.schema_id.clone(),
            recursive: self.recursive,
        }
    }

    fn load_source(&self) -> anyhow::Result<ManifestSource> {
        ManifestSource::open(self.paths.as_slice(), &self.config())
            .with_context(|| format!("load record descriptors from {}", self.origin()))
    }

    fn origin(&self) -> String {
        self.paths.join(", ")
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Whether any subcommand asked for debug-level logging.
    pub fn verbose(&self) -> bool {
        match &self.cmd {
            Command::Generate(target) => target.input_settings.verbose,
            Command::Show(target) => target.input_settings.verbose,
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(())
                }

                let settings = &target.input_settings;
                let source = settings.load_source()?;
                let generator = Generator::new(&source, settings.config()).origin(settings.origin());
                let writer = Writer::new(&target.output_dir);
                for path in generator.run(&writer)? {
                    println!("{} {}", "Generated:".green().bold(), path.display());
                }
            }
            Command::Show(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(())
                }

                let settings = &target.input_settings;
                let source = settings.load_source()?;
                let generator = Generator::new(&source, settings.config()).origin(settings.origin());
                let docs = generator.build()?;
                let Some((_, doc)) = docs.iter().find(|(name, _)| *name == target.record) else {
                    bail!("record `{}` produced no schema document", target.record);
                };

                let schema_src = doc.to_json_pretty().context("serialize schema document")?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("create {}", parent.display()))?;
                    }
                    std::fs::write(out, format!("{schema_src}\n"))
                        .with_context(|| format!("write {}", out.display()))?;
                    println!("{} {}", "Generated:".green().bold(), out.display());
                } else {
                    println!("{schema_src}");
                }
            }
        }
        Ok(())
    }
}

// ------------------------------- Tests ------------------------------------ //
