//! Analytic Hierarchy Process.
//!
//! A node's children are compared pairwise on Saaty's 1–9 scale. The
//! reciprocal comparison matrix yields child priorities either as its
//! principal right eigenvector (power iteration) or as the normalized
//! geometric mean of its rows. The consistency ratio CR = CI / RI measures
//! how far the judgments are from perfectly transitive, where
//! CI = (λmax − n) / (n − 1) and RI is the mean CI of random matrices.
//!
//! Judgments are written as
//!
//! - numbers: `3`, `0.2`
//! - fractions: `"1/3"`
//! - linguistic terms: `"strong"`, `"1/moderate"`
//! - triangular fuzzy numbers `[l, m, u]`, reduced to their centroid

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::{PriorityMethod, WeightingConfig};
use crate::errors::{ModelError, Result};
use crate::model::DescriptionFormat;

/// Saaty's random consistency index for n = 1..=15.
const RANDOM_INDEX: [f64; 15] = [
    0.0, 0.0, 0.58, 0.90, 1.12, 1.24, 1.32, 1.41, 1.45, 1.49, 1.51, 1.48, 1.56, 1.57, 1.59,
];

/// Saaty's fundamental scale.
const LINGUISTIC_SCALE: [(&str, f64); 9] = [
    ("equal", 1.0),
    ("weak", 2.0),
    ("moderate", 3.0),
    ("moderate-plus", 4.0),
    ("strong", 5.0),
    ("strong-plus", 6.0),
    ("very-strong", 7.0),
    ("very-very-strong", 8.0),
    ("extreme", 9.0),
];

pub fn random_index(n: usize) -> f64 {
    match n {
        0 => 0.0,
        n if n <= RANDOM_INDEX.len() => RANDOM_INDEX[n - 1],
        _ => RANDOM_INDEX[RANDOM_INDEX.len() - 1],
    }
}

/// One matrix cell as written in a comparison file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Judgment {
    Number(f64),
    Text(String),
    Fuzzy([f64; 3]),
}

impl Judgment {
    /// Crisp intensity of this judgment.
    pub fn intensity(&self, node: &str) -> Result<f64> {
        let value = match self {
            Judgment::Number(value) => *value,
            Judgment::Text(text) => parse_text(text).ok_or_else(|| {
                ModelError::malformed_matrix(node, format!("unrecognized judgment '{text}'"))
            })?,
            Judgment::Fuzzy([l, m, u]) => {
                if !(l <= m && m <= u) {
                    return Err(ModelError::malformed_matrix(
                        node,
                        format!("fuzzy judgment [{l}, {m}, {u}] is not ordered"),
                    ));
                }
                (l + m + u) / 3.0
            }
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(ModelError::malformed_matrix(
                node,
                format!("judgment must be a positive number, got {value}"),
            ));
        }
        Ok(value)
    }
}

fn parse_text(text: &str) -> Option<f64> {
    let text = text.trim().to_ascii_lowercase();
    if let Some((numerator, denominator)) = text.split_once('/') {
        let numerator = parse_atom(numerator.trim())?;
        let denominator = parse_atom(denominator.trim())?;
        return Some(numerator / denominator);
    }
    parse_atom(&text)
}

fn parse_atom(atom: &str) -> Option<f64> {
    atom.parse::<f64>().ok().or_else(|| {
        let term = atom.replace(['_', ' '], "-");
        LINGUISTIC_SCALE
            .iter()
            .find(|(name, _)| *name == term)
            .map(|(_, value)| *value)
    })
}

/// Pairwise comparisons for one node's children.
///
/// `upper[i]` holds row `i` compared against columns `i+1..n`; the lower
/// triangle is implied by reciprocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonSpec {
    pub node: String,
    pub items: Vec<String>,
    #[serde(default)]
    pub upper: Vec<Vec<Judgment>>,
}

/// Read a comparison file (YAML or JSON by extension).
pub fn load_comparisons(path: &Path) -> Result<Vec<ComparisonSpec>> {
    let contents = std::fs::read_to_string(path)?;
    let specs: Vec<ComparisonSpec> = match DescriptionFormat::from_path(path) {
        DescriptionFormat::Json => serde_json::from_str(&contents)?,
        DescriptionFormat::Yaml => serde_yaml::from_str(&contents)?,
    };

    let mut seen = BTreeSet::new();
    for spec in &specs {
        if !seen.insert(spec.node.as_str()) {
            return Err(ModelError::import_with_path(
                format!("node '{}' has more than one comparison matrix", spec.node),
                path,
            ));
        }
    }
    log::debug!("Loaded {} comparison matrices from {}", specs.len(), path.display());
    Ok(specs)
}

/// A validated positive reciprocal matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonMatrix {
    node: String,
    items: Vec<String>,
    values: DMatrix<f64>,
}

impl ComparisonMatrix {
    pub fn from_spec(spec: &ComparisonSpec) -> Result<Self> {
        let node = spec.node.as_str();
        let n = spec.items.len();
        if n == 0 {
            return Err(ModelError::malformed_matrix(node, "no items to compare"));
        }
        let unique: BTreeSet<_> = spec.items.iter().collect();
        if unique.len() != n {
            return Err(ModelError::malformed_matrix(node, "items must be distinct"));
        }

        // a trailing empty row for the last item is allowed
        let rows = match spec.upper.last() {
            Some(last) if spec.upper.len() == n && last.is_empty() => &spec.upper[..n - 1],
            _ => &spec.upper[..],
        };
        if rows.len() != n - 1 {
            return Err(ModelError::malformed_matrix(
                node,
                format!("expected {} upper-triangle rows, got {}", n - 1, rows.len()),
            ));
        }

        let mut values = DMatrix::<f64>::identity(n, n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n - 1 - i {
                return Err(ModelError::malformed_matrix(
                    node,
                    format!(
                        "row {} ('{}') needs {} entries, got {}",
                        i,
                        spec.items[i],
                        n - 1 - i,
                        row.len()
                    ),
                ));
            }
            for (offset, judgment) in row.iter().enumerate() {
                let j = i + 1 + offset;
                let value = judgment.intensity(node)?;
                values[(i, j)] = value;
                values[(j, i)] = 1.0 / value;
            }
        }

        Ok(Self {
            node: spec.node.clone(),
            items: spec.items.clone(),
            values,
        })
    }

    /// Wrap a full matrix, checking squareness, positivity and reciprocity.
    pub fn from_values(
        node: impl Into<String>,
        items: Vec<String>,
        values: DMatrix<f64>,
    ) -> Result<Self> {
        let node = node.into();
        let n = items.len();
        if n == 0 || values.nrows() != n || values.ncols() != n {
            return Err(ModelError::malformed_matrix(
                &node,
                format!(
                    "{} items need a {n}x{n} matrix, got {}x{}",
                    n,
                    values.nrows(),
                    values.ncols()
                ),
            ));
        }
        for i in 0..n {
            for j in 0..n {
                let a = values[(i, j)];
                if !a.is_finite() || a <= 0.0 {
                    return Err(ModelError::malformed_matrix(
                        &node,
                        format!("entry ({i}, {j}) must be positive, got {a}"),
                    ));
                }
                if (a * values[(j, i)] - 1.0).abs() > 1e-9 {
                    return Err(ModelError::malformed_matrix(
                        &node,
                        format!("entries ({i}, {j}) and ({j}, {i}) are not reciprocal"),
                    ));
                }
            }
        }
        Ok(Self {
            node,
            items,
            values,
        })
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }
}

/// Settings for priority extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AhpOptions {
    pub method: PriorityMethod,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for AhpOptions {
    fn default() -> Self {
        Self::from(&WeightingConfig::default())
    }
}

impl From<&WeightingConfig> for AhpOptions {
    fn from(config: &WeightingConfig) -> Self {
        Self {
            method: config.method,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }
}

/// Priorities and consistency of one matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Priorities {
    pub node: String,
    /// Child name → weight, summing to 1.
    pub weights: BTreeMap<String, f64>,
    pub lambda_max: f64,
    pub consistency_index: f64,
    pub consistency_ratio: f64,
}

impl Priorities {
    pub fn is_consistent(&self, threshold: f64) -> bool {
        self.consistency_ratio <= threshold
    }
}

/// Extract priorities from a matrix.
pub fn priorities(matrix: &ComparisonMatrix, options: &AhpOptions) -> Result<Priorities> {
    let vector = match options.method {
        PriorityMethod::Eigenvector => principal_eigenvector(matrix, options)?,
        PriorityMethod::GeometricMean => geometric_mean(matrix)?,
    };

    let n = matrix.size();
    let weighted = matrix.values() * &vector;
    let lambda_max = (0..n).map(|i| weighted[i] / vector[i]).sum::<f64>() / n as f64;
    let consistency_index = if n > 2 {
        ((lambda_max - n as f64) / (n as f64 - 1.0)).max(0.0)
    } else {
        0.0
    };
    let ri = random_index(n);
    let consistency_ratio = if ri > 0.0 { consistency_index / ri } else { 0.0 };

    let weights = matrix
        .items()
        .iter()
        .cloned()
        .zip(vector.iter().copied())
        .collect();

    Ok(Priorities {
        node: matrix.node().to_string(),
        weights,
        lambda_max,
        consistency_index,
        consistency_ratio,
    })
}

fn principal_eigenvector(matrix: &ComparisonMatrix, options: &AhpOptions) -> Result<DVector<f64>> {
    let n = matrix.size();
    let mut v = DVector::from_element(n, 1.0 / n as f64);

    for iteration in 1..=options.max_iterations {
        let mut next = matrix.values() * &v;
        let sum: f64 = next.iter().sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(ModelError::SingularMatrix {
                node: matrix.node().to_string(),
                message: format!("power iteration diverged at step {iteration}"),
            });
        }
        next /= sum;

        let delta: f64 = (&next - &v).iter().map(|d| d.abs()).sum();
        v = next;
        if delta <= options.tolerance {
            log::trace!(
                "{}: eigenvector converged after {} iterations",
                matrix.node(),
                iteration
            );
            return Ok(v);
        }
    }

    log::warn!(
        "{}: eigenvector did not converge within {} iterations; using last estimate",
        matrix.node(),
        options.max_iterations
    );
    Ok(v)
}

fn geometric_mean(matrix: &ComparisonMatrix) -> Result<DVector<f64>> {
    let n = matrix.size();
    let values = matrix.values();
    let means = DVector::from_iterator(
        n,
        (0..n).map(|i| {
            let log_sum: f64 = values.row(i).iter().map(|a| a.ln()).sum();
            (log_sum / n as f64).exp()
        }),
    );
    let sum: f64 = means.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(ModelError::SingularMatrix {
            node: matrix.node().to_string(),
            message: "row geometric means do not sum to a positive value".to_string(),
        });
    }
    Ok(means / sum)
}
