//! CSV tables for spreadsheets and plotting.

use crate::types::{CandidateRow, ColumnReport};

fn push_row(out: &mut String, cells: &[String]) {
    out.push_str(&cells.join(","));
    out.push('\n');
}

/// One row per stage, condenser first; per-component columns are named
/// after the components.
pub fn stage_table_csv(report: &ColumnReport) -> String {
    let mut header: Vec<String> = [
        "stage",
        "kind",
        "temperature_k",
        "pressure_pa",
        "liquid_mol_s",
        "vapor_mol_s",
        "liquid_draw_mol_s",
        "vapor_draw_mol_s",
        "duty_w",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for prefix in ["x", "y", "k"] {
        header.extend(report.components.iter().map(|c| format!("{prefix}_{c}")));
    }
    header.push("vlle".to_string());
    header.push("converged".to_string());

    let mut csv = String::new();
    push_row(&mut csv, &header);
    let nc = report.components.len();
    for row in &report.stages {
        let mut cells = vec![
            row.stage.to_string(),
            row.kind.clone(),
            row.temperature_k.to_string(),
            row.pressure_pa.to_string(),
            row.liquid_mol_s.to_string(),
            row.vapor_mol_s.to_string(),
            row.liquid_draw_mol_s.to_string(),
            row.vapor_draw_mol_s.to_string(),
            row.duty_w.to_string(),
        ];
        for values in [&row.x, &row.y, &row.k_values] {
            // single-phase stages carry no K-values
            cells.extend((0..nc).map(|i| values.get(i).map(f64::to_string).unwrap_or_default()));
        }
        cells.push(row.vlle.to_string());
        cells.push(row.convergence.converged.to_string());
        push_row(&mut csv, &cells);
    }
    csv
}

pub fn candidate_table_csv(components: &[String], rows: &[CandidateRow]) -> String {
    let mut header: Vec<String> = [
        "reflux_ratio",
        "outcome",
        "shortfall",
        "objective",
        "condenser_cost",
        "reboiler_cost",
        "capital_cost",
        "total_cost",
        "sweeps",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(components.iter().map(|c| format!("x_d_{c}")));

    let mut csv = String::new();
    push_row(&mut csv, &header);
    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for row in rows {
        let mut cells = vec![
            row.reflux_ratio.to_string(),
            row.outcome.clone(),
            opt(row.shortfall),
            row.objective.to_string(),
            opt(row.cost.map(|c| c.condenser)),
            opt(row.cost.map(|c| c.reboiler)),
            opt(row.cost.map(|c| c.capital)),
            opt(row.cost.map(|c| c.total)),
            row.sweeps.map(|s| s.to_string()).unwrap_or_default(),
        ];
        cells.extend(
            (0..components.len())
                .map(|i| row.distillate.get(i).map(f64::to_string).unwrap_or_default()),
        );
        push_row(&mut csv, &cells);
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CostRow;

    #[test]
    fn candidate_table_leaves_missing_values_empty() {
        let rows = vec![
            CandidateRow {
                reflux_ratio: 1.5,
                outcome: "diverged".to_string(),
                shortfall: None,
                objective: 1e12,
                cost: None,
                sweeps: None,
                distillate: vec![],
            },
            CandidateRow {
                reflux_ratio: 3.0,
                outcome: "feasible".to_string(),
                shortfall: None,
                objective: 2.5,
                cost: Some(CostRow {
                    condenser: 0.5,
                    reboiler: 1.5,
                    capital: 0.5,
                    total: 2.5,
                }),
                sweeps: Some(42),
                distillate: vec![0.96, 0.04],
            },
        ];
        let names = vec!["A".to_string(), "B".to_string()];
        let csv = candidate_table_csv(&names, &rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("sweeps,x_d_A,x_d_B"));
        assert_eq!(lines[1], "1.5,diverged,,1000000000000,,,,,,,");
        assert_eq!(lines[2], "3,feasible,,2.5,0.5,1.5,0.5,2.5,42,0.96,0.04");
    }
}
