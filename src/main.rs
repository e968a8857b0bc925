use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Instrument, Level, info, info_span, warn};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use kycfill::io::MappingReport;
use kycfill::models::{DocumentField, FieldId, FieldMapping, MappingTemplate, StructuredRecord, TurnKind};
use kycfill::{
    EmbeddingClient, EmbeddingConfig, FieldDiscovery, FieldPopulator, JsonFormDocument, PipelineConfig,
    SemanticSimilarity, Stage4Config, TemplateStore, execute_stage4, extract_record, map_fields, map_with_template,
    prepare_semantic, read_record, read_transcript, write_mapping_report, write_record,
};

#[derive(Parser)]
#[command(name = "kycfill")]
#[command(author, version, about = "Fill KYC forms from advisor/client meeting transcripts", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a structured KYC record from a transcript
    Extract {
        /// Input transcript file (plain text, `Speaker: text` lines)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the record (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Map an extracted record onto a form's fields
    Map {
        /// Record produced by `extract`
        #[arg(short, long)]
        record: PathBuf,

        /// Form field list (JSON)
        #[arg(short, long)]
        fields: PathBuf,

        /// Output file for the mapping report (JSON)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        matching: MatchingArgs,
    },

    /// Extract, map and fill a form in one go
    Fill {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Form field list (JSON)
        #[arg(short, long)]
        fields: PathBuf,

        /// Output file for the filled form (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the extracted record here
        #[arg(long)]
        record_output: Option<PathBuf>,

        /// Also write the mapping report here
        #[arg(long)]
        mapping_output: Option<PathBuf>,

        /// Save the resulting mapping as a template with this name
        #[arg(long)]
        save_template: Option<String>,

        /// Leave low-confidence values out of the form
        #[arg(long)]
        skip_low_confidence: bool,

        #[command(flatten)]
        matching: MatchingArgs,
    },

    /// Analyze a transcript or a form without writing anything
    Analyze {
        /// Input transcript file
        #[arg(short, long, required_unless_present = "fields")]
        input: Option<PathBuf>,

        /// Form field list (JSON)
        #[arg(short, long)]
        fields: Option<PathBuf>,
    },

    /// Build a mapping template from a form alone, over every KYC field
    CreateTemplate {
        /// Form field list (JSON)
        #[arg(short, long)]
        fields: PathBuf,

        /// Template name
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        matching: MatchingArgs,
    },

    /// Print one saved template's mappings
    ShowTemplate {
        /// Template name
        #[arg(short, long)]
        name: String,

        /// Directory holding saved mapping templates
        #[arg(long, default_value = "templates")]
        template_dir: PathBuf,
    },

    /// List saved mapping templates
    Templates {
        /// Directory holding saved mapping templates
        #[arg(long, default_value = "templates")]
        template_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct MatchingArgs {
    /// Directory holding saved mapping templates
    #[arg(long, default_value = "templates")]
    template_dir: PathBuf,

    /// Apply this saved template before matching
    #[arg(long)]
    template: Option<String>,

    /// Minimum similarity for a fuzzy match (0-1)
    #[arg(long, default_value = "0.8")]
    fuzzy_threshold: f64,

    /// Minimum similarity for a semantic match (0-1)
    #[arg(long, default_value = "0.75")]
    semantic_threshold: f64,

    /// Skip the embedding backend even if configured
    #[arg(long)]
    no_semantic: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let span = info_span!("run", run_id = %Uuid::new_v4());
    run(cli.command).instrument(span).await
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Extract { input, output } => extract_transcript(input, output),
        Commands::Map {
            record,
            fields,
            output,
            matching,
        } => map_record(record, fields, output, matching).await,
        Commands::Fill {
            input,
            fields,
            output,
            record_output,
            mapping_output,
            save_template,
            skip_low_confidence,
            matching,
        } => {
            fill_form(
                input,
                fields,
                output,
                record_output,
                mapping_output,
                save_template,
                skip_low_confidence,
                matching,
            )
            .await
        }
        Commands::Analyze { input, fields } => {
            if let Some(input) = input {
                analyze_transcript(input)?;
            }
            match fields {
                Some(fields) => analyze_form(fields),
                None => Ok(()),
            }
        }
        Commands::CreateTemplate { fields, name, matching } => create_template(fields, name, matching).await,
        Commands::ShowTemplate { name, template_dir } => show_template(name, template_dir),
        Commands::Templates { template_dir } => list_templates(template_dir),
    }
}

fn load_record_from_transcript(input: &Path) -> Result<StructuredRecord> {
    info!("Loading transcript from {:?}", input);
    let text = read_transcript(input)?;
    let extraction = extract_record(&text, &PipelineConfig::default()).context("Failed to process transcript")?;

    info!(
        "Extracted {} fields, completion {:.0}%",
        extraction.record.len(),
        extraction.record.completion_percentage() * 100.0
    );
    Ok(extraction.record)
}

fn extract_transcript(input: PathBuf, output: PathBuf) -> Result<()> {
    let record = load_record_from_transcript(&input)?;
    write_record(&record, &output)?;
    info!("Record written to {:?}", output);
    Ok(())
}

/// Run the mapper with whatever strategies this run has available
async fn map_onto(field_ids: &[FieldId], documents: &[DocumentField], args: &MatchingArgs) -> Result<Vec<FieldMapping>> {

    let client = if args.no_semantic {
        info!("Semantic matching disabled (--no-semantic)");
        None
    } else {
        match EmbeddingConfig::from_env() {
            Ok(config) => Some(EmbeddingClient::new(config)),
            Err(e) => {
                info!("No embedding backend: {}", e);
                None
            }
        }
    };
    let index = prepare_semantic(client.as_ref(), field_ids, documents).await;
    let semantic = index.as_ref().map(|i| i as &dyn SemanticSimilarity);

    let config = kycfill::MapperConfig {
        fuzzy_threshold: args.fuzzy_threshold,
        semantic_threshold: args.semantic_threshold,
    };

    let mappings = match &args.template {
        Some(name) => {
            let store = TemplateStore::open(&args.template_dir)?;
            match store.load(name)? {
                Some(template) => map_with_template(field_ids, documents, &template, semantic, &config),
                None => bail!("Template {:?} not found in {:?}", name, args.template_dir),
            }
        }
        None => map_fields(field_ids, documents, semantic, &config),
    };
    Ok(mappings)
}

async fn map_record(record: PathBuf, fields: PathBuf, output: PathBuf, matching: MatchingArgs) -> Result<()> {
    info!("Loading record from {:?}", record);
    let record = read_record(&record).context("Failed to load record")?;
    let documents = JsonFormDocument::from_file(&fields)?.discover();

    let mappings = map_onto(&record.field_ids(), &documents, &matching).await?;
    let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
    let report = MappingReport::new(mappings, &names);

    write_mapping_report(&report, &output)?;
    info!(
        "Mapping written to {:?} ({} mapped, {} unmapped)",
        output, report.mapped, report.unmapped
    );
    Ok(())
}

async fn fill_form(
    input: PathBuf,
    fields: PathBuf,
    output: PathBuf,
    record_output: Option<PathBuf>,
    mapping_output: Option<PathBuf>,
    save_template: Option<String>,
    skip_low_confidence: bool,
    matching: MatchingArgs,
) -> Result<()> {
    let record = load_record_from_transcript(&input)?;
    if let Some(path) = &record_output {
        write_record(&record, path)?;
        info!("Record written to {:?}", path);
    }

    let mut form = JsonFormDocument::from_file(&fields)?;
    let documents = form.discover();
    let mappings = map_onto(&record.field_ids(), &documents, &matching).await?;

    if let Some(name) = save_template {
        let store = TemplateStore::open(&matching.template_dir)?;
        store.save(&MappingTemplate::from_mappings(name, &mappings))?;
    }

    info!("Stage 4: Rendering values...");
    let stage4_config = Stage4Config {
        skip_low_confidence,
        ..Default::default()
    };
    let rendered = execute_stage4(&record, &mappings, &documents, &stage4_config);
    let outcomes = form.populate(&rendered.assignments);
    form.write_filled(&output)?;

    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        warn!("{} of {} fields could not be filled", failed, outcomes.len());
    }
    info!("Filled form written to {:?}", output);

    if let Some(path) = &mapping_output {
        let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
        write_mapping_report(&MappingReport::new(mappings, &names), path)?;
        info!("Mapping written to {:?}", path);
    }

    Ok(())
}

fn analyze_transcript(input: PathBuf) -> Result<()> {
    info!("Analyzing transcript from {:?}", input);
    let text = read_transcript(&input)?;
    let extraction = extract_record(&text, &PipelineConfig::default()).context("Failed to process transcript")?;

    let qa = extraction.turns.iter().filter(|t| t.kind == TurnKind::Qa).count();

    println!("Transcript Analysis");
    println!("===================");
    println!("Turns: {} ({} Q&A, {} statements)", extraction.turns.len(), qa, extraction.turns.len() - qa);
    println!();

    println!("Proposals");
    println!("---------");
    for (strategy, count) in &extraction.per_strategy {
        println!("{:?}: {}", strategy, count);
    }
    println!(
        "Accepted: {}, rejected: {}, below threshold: {}",
        extraction.report.accepted, extraction.report.rejected, extraction.report.below_threshold
    );
    println!();

    let record = &extraction.record;
    println!("Record");
    println!("------");
    for (field, entry) in record.iter() {
        let flag = if entry.low_confidence { " (low confidence)" } else { "" };
        println!("{}: {} [{:.2}]{}", field, entry.value.render(), entry.confidence, flag);
    }
    println!();
    println!("Completion: {:.0}%", record.completion_percentage() * 100.0);

    let missing = record.missing_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
        println!("Missing required: {}", names.join(", "));
    }

    Ok(())
}

fn analyze_form(fields: PathBuf) -> Result<()> {
    info!("Analyzing form fields from {:?}", fields);
    let documents = JsonFormDocument::from_file(&fields)?.discover();

    println!("Form Analysis");
    println!("=============");
    println!("Fields: {}", documents.len());
    println!();
    for document in &documents {
        if document.options.is_empty() {
            println!("{} ({:?})", document.name, document.field_type);
        } else {
            println!("{} ({:?}: {})", document.name, document.field_type, document.options.join(", "));
        }
    }

    Ok(())
}

async fn create_template(fields: PathBuf, name: String, matching: MatchingArgs) -> Result<()> {
    let documents = JsonFormDocument::from_file(&fields)?.discover();
    let mappings = map_onto(&FieldId::ALL, &documents, &matching).await?;

    let template = MappingTemplate::from_mappings(name, &mappings);
    let store = TemplateStore::open(&matching.template_dir)?;
    store.save(&template)?;

    info!(
        "Template {:?} saved with {} of {} fields mapped",
        template.name,
        template.mappings.len(),
        documents.len()
    );
    Ok(())
}

fn show_template(name: String, template_dir: PathBuf) -> Result<()> {
    let store = TemplateStore::open(&template_dir)?;
    let Some(template) = store.load(&name)? else {
        bail!("Template {:?} not found in {:?}", name, template_dir);
    };

    println!("Template: {}", template.name);
    println!("Mappings: {}", template.mappings.len());
    println!();
    for (field, entry) in &template.mappings {
        println!(
            "{} -> {} ({:?}, {:.2})",
            field, entry.document_field, entry.method, entry.confidence
        );
    }
    Ok(())
}

fn list_templates(template_dir: PathBuf) -> Result<()> {
    let store = TemplateStore::open(&template_dir)?;
    let names = store.list()?;

    if names.is_empty() {
        println!("No templates in {:?}", template_dir);
        return Ok(());
    }
    for name in names {
        match store.load(&name)? {
            Some(template) => println!("{} ({} mappings)", name, template.mappings.len()),
            None => println!("{}", name),
        }
    }
    Ok(())
}
