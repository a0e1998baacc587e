use std::fs;

use log::debug;
use majority_judgment::{ChoiceResult, JudgmentResult};
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::poll::io_csv::OutOfScaleValue;
use crate::poll::{OpeningJsonSnafu, ParsingJsonSnafu, PollResult};

fn choice_to_json(result: &ChoiceResult, scale: &majority_judgment::GradeScale) -> JSValue {
    let mut js = json!({
        "choice": result.name,
        "rank": result.rank,
        "counts": result.counts,
        "total": result.total,
        // The line a chart draws to show where the majority lies.
        "half": result.total as f64 / 2.0,
    });
    match &result.stats {
        Ok(stats) => {
            js["majorityGrade"] = json!({
                "rank": stats.majority_grade,
                "label": scale.label(stats.majority_grade),
            });
            js["median"] = json!(stats.median);
            js["mean"] = json!(stats.mean);
        }
        Err(e) => {
            js["error"] = json!(e.to_string());
        }
    }
    js
}

/// The JSON report of a poll: the choices best first, then the choices without data.
pub fn build_summary_js(
    title: &str,
    result: &JudgmentResult,
    warnings: &[OutOfScaleValue],
) -> JSValue {
    let results: Vec<JSValue> = result
        .results
        .iter()
        .map(|r| choice_to_json(r, &result.scale))
        .collect();
    let warnings_js: Vec<JSValue> = warnings
        .iter()
        .map(|w| json!({"line": w.lineno, "column": w.column, "value": w.value}))
        .collect();
    json!({
        "config": {
            "title": title,
            "grades": result.scale.labels(),
        },
        "winner": result.winner(),
        "results": results,
        "warnings": warnings_js,
    })
}

pub fn read_summary(path: &str) -> PollResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_summary: {} results", js["results"].as_array().map_or(0, |a| a.len()));
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;
    use majority_judgment::{run_judgment_stats, ChoiceTally, GradeScale, JudgmentRules};

    fn tally(name: &str, counts: &[u64]) -> ChoiceTally {
        ChoiceTally {
            name: name.to_string(),
            counts: counts.to_vec(),
        }
    }

    fn example() -> JudgmentResult {
        let scale = GradeScale::likert_english();
        run_judgment_stats(
            &[
                tally("Sushi", &[4, 0, 0, 1, 1]),
                tally("Salad", &[0, 0, 0, 0, 0]),
                tally("Pizza", &[1, 3, 2, 1, 1]),
            ],
            &scale,
            &JudgmentRules::DEFAULT_RULES,
        )
        .unwrap()
    }

    #[test]
    fn summary_lists_choices_by_rank() {
        let js = build_summary_js("Lunch", &example(), &[]);
        assert_eq!(js["config"]["title"], json!("Lunch"));
        assert_eq!(js["winner"], json!("Pizza"));
        let results = js["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);

        let pizza = &results[0];
        assert_eq!(pizza["choice"], json!("Pizza"));
        assert_eq!(pizza["rank"], json!(1));
        assert_eq!(pizza["majorityGrade"]["rank"], json!(2));
        assert_eq!(pizza["majorityGrade"]["label"], json!("Disagree"));
        assert_eq!(pizza["median"], json!(2.5));
        assert_eq!(pizza["mean"], json!(2.75));
        assert_eq!(pizza["half"], json!(4.0));
        assert_eq!(pizza["counts"], json!([1, 3, 2, 1, 1]));

        assert_eq!(results[1]["choice"], json!("Sushi"));
        let salad = &results[2];
        assert_eq!(salad["rank"], JSValue::Null);
        assert_eq!(salad["error"], json!("no grade recorded"));
        assert!(salad.get("majorityGrade").is_none());
    }

    #[test]
    fn summary_carries_warnings() {
        let warnings = vec![OutOfScaleValue {
            lineno: 3,
            column: "Pizza".to_string(),
            value: "9".to_string(),
        }];
        let js = build_summary_js("Lunch", &example(), &warnings);
        assert_eq!(
            js["warnings"],
            json!([{"line": 3, "column": "Pizza", "value": "9"}])
        );
    }

    #[test]
    fn read_written_summary() {
        let js = build_summary_js("Lunch", &example(), &[]);
        let path = std::env::temp_dir().join(format!("mj-summary-{}.json", uuid::Uuid::new_v4()));
        let path = path.to_str().unwrap().to_string();
        fs::write(&path, serde_json::to_string_pretty(&js).unwrap()).unwrap();
        assert_eq!(read_summary(&path).unwrap(), js);
        fs::remove_file(&path).unwrap();
        assert!(read_summary(&path).is_err());
    }
}
