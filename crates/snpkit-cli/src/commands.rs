use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

use snpkit_core::{
    AnalysisConfig, GenotypeMatrix, HierarchicalConfig, KMeansConfig, Variant,
};
use snpkit_io::{load_with, LoadOptions, LoadReport};
use snpkit_stats::{
    allele_frequencies, filter, hwe_table, ld, window_pairs, FilterReport, HweStatus,
};
use snpkit_structure::{hierarchical, kmeans, pca, ClusterAssignment, Dendrogram};

use crate::output::{fmt_f64, table_writer, write_json};
use crate::InputArgs;

/// Matrix after loading and filtering, with both reports.
pub struct Prepared {
    pub matrix: GenotypeMatrix,
    pub load: LoadReport,
    pub filter: FilterReport,
    pub loaded_samples: usize,
    pub loaded_variants: usize,
}

pub fn prepare(config: &AnalysisConfig, input: &InputArgs) -> Result<Prepared> {
    let options = LoadOptions {
        chunk_size: input.chunk_size.unwrap_or(config.io.chunk_size),
        format: input.format,
    };
    let (raw, load) = load_with(&input.inputs, &options).context("loading genotype inputs")?;

    for file in &load.files {
        if !file.rejected.is_empty() {
            log::warn!(
                "{}: {} of {} rows rejected",
                file.path.display(),
                file.rejected.len(),
                file.records + file.rejected.len()
            );
        }
    }
    if !load.conflicts.is_empty() {
        log::warn!(
            "{} genotype call(s) overwritten while merging inputs (last file wins)",
            load.conflicts.len()
        );
    }

    let thresholds = crate::filter_config(&config.filter, input)?;
    let (matrix, report) = filter(&raw, &thresholds)?;
    Ok(Prepared {
        loaded_samples: raw.n_samples(),
        loaded_variants: raw.n_variants(),
        matrix,
        load,
        filter: report,
    })
}

fn variant_cells(v: &Variant) -> [String; 5] {
    [
        v.label(),
        v.key.chrom.clone(),
        v.key.pos.to_string(),
        v.key.ref_allele.clone(),
        v.key.alt_allele.clone(),
    ]
}

const VARIANT_HEADER: [&str; 5] = ["variant_id", "chrom", "pos", "ref", "alt"];

pub fn run_summary(
    config: &AnalysisConfig,
    input: &InputArgs,
    conflicts_out: Option<&Path>,
    exclusions_out: Option<&Path>,
) -> Result<()> {
    let p = prepare(config, input)?;
    let records: usize = p.load.files.iter().map(|f| f.records).sum();

    let mut wtr = table_writer(input.out.as_deref())?;
    wtr.write_record(["metric", "value"])?;
    let rows = [
        ("files", p.load.files.len()),
        ("records", records),
        ("rejected_rows", p.load.rejected_rows()),
        ("merge_conflicts", p.load.conflicts.len()),
        ("loaded_samples", p.loaded_samples),
        ("loaded_variants", p.loaded_variants),
        ("excluded_samples", p.filter.excluded_samples.len()),
        ("excluded_variants", p.filter.excluded_variants.len()),
        ("samples", p.matrix.n_samples()),
        ("variants", p.matrix.n_variants()),
    ];
    for (name, value) in rows {
        wtr.write_record([name.to_string(), value.to_string()])?;
    }
    for file in &p.load.files {
        for rej in &file.rejected {
            log::debug!("{}:{}: {}", file.path.display(), rej.line, rej.message);
        }
    }
    wtr.flush()?;

    if let Some(path) = conflicts_out {
        let source = |i: usize| {
            p.load
                .files
                .get(i)
                .map(|f| f.path.display().to_string())
                .unwrap_or_else(|| i.to_string())
        };
        let mut w = table_writer(Some(path))?;
        w.write_record([
            "sample_id",
            "chrom",
            "pos",
            "ref",
            "alt",
            "previous",
            "replacement",
            "previous_source",
            "replacement_source",
        ])?;
        for c in &p.load.conflicts {
            w.write_record([
                c.sample.clone(),
                c.variant.chrom.clone(),
                c.variant.pos.to_string(),
                c.variant.ref_allele.clone(),
                c.variant.alt_allele.clone(),
                c.previous.to_string(),
                c.replacement.to_string(),
                source(c.previous_source),
                source(c.replacement_source),
            ])?;
        }
        w.flush()?;
    }

    if let Some(path) = exclusions_out {
        let mut w = table_writer(Some(path))?;
        w.write_record(["kind", "index", "id", "threshold", "observed", "required"])?;
        for v in &p.filter.excluded_variants {
            for violation in &v.violations {
                w.write_record([
                    "variant".to_string(),
                    v.index.to_string(),
                    format!("{}:{}", v.key.chrom, v.key.pos),
                    violation.threshold.to_string(),
                    fmt_f64(violation.observed),
                    fmt_f64(violation.required),
                ])?;
            }
        }
        for s in &p.filter.excluded_samples {
            w.write_record([
                "sample".to_string(),
                s.index.to_string(),
                s.id.clone(),
                "max_sample_missing".to_string(),
                fmt_f64(s.call_rate),
                fmt_f64(s.required),
            ])?;
        }
        w.flush()?;
    }
    Ok(())
}

pub fn run_freq(config: &AnalysisConfig, input: &InputArgs) -> Result<()> {
    let p = prepare(config, input)?;
    let m = &p.matrix;
    let mut wtr = table_writer(input.out.as_deref())?;
    let mut header: Vec<&str> = VARIANT_HEADER.to_vec();
    header.extend(["ref_count", "alt_count", "alt_freq", "maf", "missing"]);
    wtr.write_record(&header)?;

    for rec in allele_frequencies(m) {
        let mut row: Vec<String> = variant_cells(&m.variants()[rec.variant]).to_vec();
        row.extend([
            rec.ref_count.to_string(),
            rec.alt_count.to_string(),
            fmt_f64(rec.alt_freq),
            fmt_f64(rec.minor_allele_freq()),
            rec.missing.to_string(),
        ]);
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn status_label(status: HweStatus) -> &'static str {
    match status {
        HweStatus::Ok => "ok",
        HweStatus::LowExpectedCount => "low_expected_count",
        HweStatus::NoCalls => "no_calls",
    }
}

pub fn run_hwe(config: &AnalysisConfig, input: &InputArgs) -> Result<()> {
    let p = prepare(config, input)?;
    let m = &p.matrix;
    let mut wtr = table_writer(input.out.as_deref())?;
    let mut header: Vec<&str> = VARIANT_HEADER.to_vec();
    header.extend([
        "hom_ref",
        "het",
        "hom_alt",
        "missing",
        "exp_hom_ref",
        "exp_het",
        "exp_hom_alt",
        "chi_square",
        "p_value",
        "exact_p_value",
        "status",
    ]);
    wtr.write_record(&header)?;

    let results = hwe_table(m);
    let flagged = results
        .iter()
        .filter(|r| r.status == HweStatus::LowExpectedCount)
        .count();
    if flagged > 0 {
        log::info!(
            "{} variant(s) have an expected genotype count below 5; see exact_p_value",
            flagged
        );
    }
    for r in results {
        let mut row: Vec<String> = variant_cells(&m.variants()[r.variant]).to_vec();
        row.extend([
            r.counts.hom_ref.to_string(),
            r.counts.het.to_string(),
            r.counts.hom_alt.to_string(),
            r.counts.missing.to_string(),
            fmt_f64(r.expected[0]),
            fmt_f64(r.expected[1]),
            fmt_f64(r.expected[2]),
            fmt_f64(r.chi_square),
            fmt_f64(r.p_value),
            fmt_f64(r.exact_p_value),
            status_label(r.status).to_string(),
        ]);
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub enum LdRequest {
    Window(usize),
    /// Raw "A,B" arguments.
    Pairs(Vec<String>),
}

/// Variant by id, `chrom:pos`, or 0-based index, in that order.
fn resolve_variant(m: &GenotypeMatrix, token: &str) -> Result<usize> {
    let token = token.trim();
    let variants = m.variants();
    if let Some(i) = variants
        .iter()
        .position(|v| v.id.as_deref() == Some(token))
    {
        return Ok(i);
    }
    if let Some(i) = variants
        .iter()
        .position(|v| format!("{}:{}", v.key.chrom, v.key.pos) == token)
    {
        return Ok(i);
    }
    match token.parse::<usize>() {
        Ok(i) if i < variants.len() => Ok(i),
        _ => bail!(
            "variant '{}' not found among the {} variants left after filtering",
            token,
            variants.len()
        ),
    }
}

fn parse_pair(m: &GenotypeMatrix, raw: &str) -> Result<(usize, usize)> {
    let (a, b) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("--pair expects A,B, got '{}'", raw))?;
    Ok((resolve_variant(m, a)?, resolve_variant(m, b)?))
}

pub fn run_ld(config: &AnalysisConfig, input: &InputArgs, request: LdRequest) -> Result<()> {
    let p = prepare(config, input)?;
    let m = &p.matrix;
    let pairs = match request {
        LdRequest::Window(w) => window_pairs(m, w),
        LdRequest::Pairs(raw) => raw
            .iter()
            .map(|r| parse_pair(m, r))
            .collect::<Result<Vec<_>>>()?,
    };
    log::info!("Computing LD for {} pair(s)", pairs.len());

    let records = pairs
        .par_iter()
        .map(|&(a, b)| ld(m, a, b))
        .collect::<snpkit_core::Result<Vec<_>>>()?;

    let mut wtr = table_writer(input.out.as_deref())?;
    wtr.write_record(["variant_a", "variant_b", "chrom", "distance", "r2", "r", "n_samples"])?;
    for rec in records {
        let (va, vb) = (&m.variants()[rec.variant_a], &m.variants()[rec.variant_b]);
        let (chrom, distance) = if va.key.chrom == vb.key.chrom {
            (va.key.chrom.clone(), va.key.pos.abs_diff(vb.key.pos).to_string())
        } else {
            (format!("{}/{}", va.key.chrom, vb.key.chrom), "NA".to_string())
        };
        wtr.write_record([
            va.label(),
            vb.label(),
            chrom,
            distance,
            fmt_f64(rec.r2),
            fmt_f64(rec.r),
            rec.n_samples.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn run_pca(
    config: &AnalysisConfig,
    input: &InputArgs,
    n_components: usize,
    json: Option<&Path>,
) -> Result<()> {
    let p = prepare(config, input)?;
    let embedding = pca(&p.matrix, n_components).context("running PCA")?;

    let mut wtr = table_writer(input.out.as_deref())?;
    let mut header = vec!["sample_id".to_string()];
    header.extend((1..=n_components).map(|k| format!("PC{}", k)));
    wtr.write_record(&header)?;
    for (s, id) in embedding.sample_ids.iter().enumerate() {
        let mut row = vec![id.clone()];
        row.extend(embedding.point(s).iter().map(|&x| fmt_f64(x)));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;

    if let Some(path) = json {
        write_json(path, &embedding)?;
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterMethod {
    KMeans,
    Hierarchical,
}

pub struct ClusterSettings {
    pub method: ClusterMethod,
    pub kmeans: KMeansConfig,
    pub hierarchical: HierarchicalConfig,
    pub n_components: usize,
}

#[derive(Serialize)]
struct HierarchicalOutput<'a> {
    assignment: &'a ClusterAssignment,
    dendrogram: &'a Dendrogram,
}

pub fn run_cluster(
    config: &AnalysisConfig,
    input: &InputArgs,
    settings: &ClusterSettings,
    json: Option<&Path>,
) -> Result<()> {
    let p = prepare(config, input)?;
    let embedding = pca(&p.matrix, settings.n_components).context("running PCA")?;

    let (assignment, dendrogram) = match settings.method {
        ClusterMethod::KMeans => (kmeans(&embedding, &settings.kmeans)?, None),
        ClusterMethod::Hierarchical => {
            let tree = hierarchical(&embedding, settings.hierarchical.linkage)?;
            (tree.cut(settings.hierarchical.n_clusters)?, Some(tree))
        }
    };
    log::info!(
        "{} cluster(s), sizes {:?}, inertia {:.4}",
        assignment.n_clusters(),
        assignment.cluster_sizes(),
        assignment.inertia
    );

    let mut wtr = table_writer(input.out.as_deref())?;
    wtr.write_record(["sample_id", "cluster"])?;
    for (id, label) in embedding.sample_ids.iter().zip(&assignment.labels) {
        wtr.write_record([id.clone(), label.to_string()])?;
    }
    wtr.flush()?;

    if let Some(path) = json {
        match &dendrogram {
            Some(tree) => write_json(
                path,
                &HierarchicalOutput {
                    assignment: &assignment,
                    dendrogram: tree,
                },
            )?,
            None => write_json(path, &assignment)?,
        }
    }
    Ok(())
}
