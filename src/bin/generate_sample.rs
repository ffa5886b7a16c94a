//! Write synthetic `<config>_<name>_<datafile>.parquet` result tables for
//! trying out the commands: one row per (variable, energy, hit threshold)
//! with list payloads, their `*Error` siblings and a stored resolution fit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Float64Builder, Int64Array, ListBuilder,
    StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const CONFIGS: [&str; 2] = ["hd_1x2x6", "vd_1x8x14"];
const NAMES: [&str; 1] = ["marley"];
const DATAFILE: &str = "Reconstruction";
const VARIABLES: [&str; 2] = ["X", "Y"];
const ENERGIES: [f64; 5] = [2.0, 5.0, 10.0, 20.0, 30.0];
const HITS: [i64; 3] = [1, 3, 5];

/// Resolution parameters `(a, b, c)` per configuration.
const RESOLUTION: [(f64, f64, f64); 2] = [(0.45, 0.03, 0.2), (0.35, 0.02, 0.15)];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn resolution(energy: f64, (a, b, c): (f64, f64, f64)) -> f64 {
    (a * a / energy + b * b + c * c / (energy * energy)).sqrt()
}

fn float_list(rows: &[Vec<f64>]) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn string_list(rows: &[Vec<&str>]) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for row in rows {
        for value in row {
            builder.values().append_value(value);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn list_field(name: &str, item: DataType) -> Field {
    Field::new(name, DataType::List(Arc::new(Field::new("item", item, true))), true)
}

#[derive(Default)]
struct Columns {
    variable: Vec<&'static str>,
    energy: Vec<f64>,
    hits: Vec<i64>,
    matched: Vec<bool>,
    efficiency: Vec<f64>,
    efficiency_error: Vec<f64>,
    values: Vec<Vec<f64>>,
    values_error: Vec<Vec<f64>>,
    truth: Vec<Vec<f64>>,
}

/// One table per configuration.  The energy scan rows also carry the
/// resolution-vs-energy curve and its fit.
fn build(config_idx: usize, rng: &mut SimpleRng) -> Result<RecordBatch> {
    let params = RESOLUTION[config_idx];
    let mut cols = Columns::default();
    for variable in VARIABLES {
        for &energy in &ENERGIES {
            for &hits in &HITS {
                let sigma = resolution(energy, params) * energy;
                let n = 200;
                let truth: Vec<f64> = (0..n).map(|_| energy * (0.5 + rng.next_f64())).collect();
                let values: Vec<f64> = truth.iter().map(|t| rng.gauss(*t, sigma)).collect();
                let errors: Vec<f64> = (0..n).map(|_| sigma * (0.8 + 0.4 * rng.next_f64())).collect();
                let eff = (100.0 - 40.0 / energy - 5.0 * hits as f64).clamp(0.0, 100.0);

                cols.variable.push(variable);
                cols.energy.push(energy);
                cols.hits.push(hits);
                cols.matched.push(hits < 5);
                cols.efficiency.push(eff);
                cols.efficiency_error.push(rng.next_f64() * 2.0 + 0.5);
                cols.values.push(values);
                cols.values_error.push(errors);
                cols.truth.push(truth);
            }
        }
    }

    let rows = cols.variable.len();
    let curve_x: Vec<f64> = ENERGIES.to_vec();
    let curve_y: Vec<Vec<f64>> = (0..rows)
        .map(|_| {
            ENERGIES
                .iter()
                .map(|&e| resolution(e, params) * (1.0 + rng.gauss(0.0, 0.03)))
                .collect()
        })
        .collect();
    let curve_err: Vec<Vec<f64>> = curve_y
        .iter()
        .map(|ys| ys.iter().map(|y| 0.03 * y).collect())
        .collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("Variable", DataType::Utf8, false),
        Field::new("Energy", DataType::Float64, false),
        Field::new("#Hits", DataType::Int64, false),
        Field::new("Matched", DataType::Boolean, false),
        Field::new("Efficiency", DataType::Float64, false),
        Field::new("EfficiencyError", DataType::Float64, false),
        list_field("Values", DataType::Float64),
        list_field("ValuesError", DataType::Float64),
        list_field("Truth", DataType::Float64),
        list_field("Curve", DataType::Float64),
        list_field("Resolution", DataType::Float64),
        list_field("ResolutionError", DataType::Float64),
        Field::new("FitFunction", DataType::Utf8, false),
        list_field("Params", DataType::Float64),
        list_field("ParamsError", DataType::Float64),
        list_field("ParamsLabels", DataType::Utf8),
        list_field("ParamsFormat", DataType::Utf8),
    ]));

    let repeat = |v: Vec<f64>| -> Vec<Vec<f64>> { vec![v; rows] };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(cols.variable)),
        Arc::new(Float64Array::from(cols.energy)),
        Arc::new(Int64Array::from(cols.hits)),
        Arc::new(BooleanArray::from(cols.matched)),
        Arc::new(Float64Array::from(cols.efficiency)),
        Arc::new(Float64Array::from(cols.efficiency_error)),
        float_list(&cols.values),
        float_list(&cols.values_error),
        float_list(&cols.truth),
        float_list(&repeat(curve_x)),
        float_list(&curve_y),
        float_list(&curve_err),
        Arc::new(StringArray::from(vec!["resolution"; rows])),
        float_list(&repeat(vec![params.0, params.1, params.2])),
        float_list(&repeat(vec![0.01, 0.002, 0.01])),
        string_list(&vec![vec!["a", "b", "c"]; rows]),
        string_list(&vec![vec![".2f", ".1e", ".2f"]; rows]),
    ];
    RecordBatch::try_new(schema, columns).context("building record batch")
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    for (idx, config) in CONFIGS.iter().enumerate() {
        for name in NAMES {
            let batch = build(idx, &mut rng)?;
            let path = out_dir.join(format!("{config}_{name}_{DATAFILE}.parquet"));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
            writer.write(&batch)?;
            writer.close()?;
            println!("Wrote {} rows to {}", batch.num_rows(), path.display());
        }
    }
    Ok(())
}
