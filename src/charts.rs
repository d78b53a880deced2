//! Plotly figure descriptions for the dashboard.
//!
//! Each builder returns `None` when there is nothing to draw, so the page
//! only renders charts backed by real scores.

use serde_json::{json, Value as Json};

use crate::heads::LabelScore;

pub const TOP_CHART_ITEMS: usize = 10;

/// Scored labels with a value, highest first (stable on ties).
fn ranked(scores: &[LabelScore], limit: usize) -> Vec<(&str, f32)> {
    let mut present: Vec<(&str, f32)> = scores
        .iter()
        .filter_map(|s| s.probability.map(|p| (s.label.as_str(), p)))
        .collect();
    present.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    present.truncate(limit);
    present
}

/// "mood_happy" -> "Happy"
fn mood_axis_label(label: &str) -> String {
    let name = label.trim_start_matches("mood_");
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Closed radar trace over the mood probabilities, radial range 0..1.
pub fn mood_radar(moods: &[LabelScore]) -> Option<Json> {
    let present: Vec<(String, f32)> = moods
        .iter()
        .filter_map(|s| s.probability.map(|p| (mood_axis_label(&s.label), p)))
        .collect();
    if present.is_empty() {
        return None;
    }

    let mut theta: Vec<String> = present.iter().map(|(l, _)| l.clone()).collect();
    let mut r: Vec<f32> = present.iter().map(|(_, p)| *p).collect();
    theta.push(theta[0].clone());
    r.push(r[0]);

    Some(json!({
        "data": [{
            "type": "scatterpolar",
            "r": r,
            "theta": theta,
            "fill": "toself",
            "name": "Mood",
        }],
        "layout": {
            "title": "Mood Profile",
            "polar": { "radialaxis": { "visible": true, "range": [0, 1] } },
            "showlegend": false,
        }
    }))
}

/// Vertical bar chart of the ten most probable instruments.
pub fn instrument_bars(instruments: &[LabelScore]) -> Option<Json> {
    let top = ranked(instruments, TOP_CHART_ITEMS);
    if top.is_empty() {
        return None;
    }
    let (x, y): (Vec<&str>, Vec<f32>) = top.into_iter().unzip();
    Some(json!({
        "data": [{ "type": "bar", "x": x, "y": y }],
        "layout": {
            "title": "Top Instruments",
            "xaxis": { "title": "Instrument" },
            "yaxis": { "title": "Probability", "range": [0, 1] },
        }
    }))
}

/// Horizontal bar chart of the ten strongest themes, strongest on top.
pub fn theme_bars(themes: &[LabelScore]) -> Option<Json> {
    let top = ranked(themes, TOP_CHART_ITEMS);
    if top.is_empty() {
        return None;
    }
    // Plotly draws the first category at the bottom.
    let (y, x): (Vec<&str>, Vec<f32>) = top.into_iter().rev().unzip();
    Some(json!({
        "data": [{ "type": "bar", "orientation": "h", "x": x, "y": y }],
        "layout": {
            "title": "Top Mood Themes",
            "xaxis": { "title": "Probability", "range": [0, 1] },
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(label: &str, p: Option<f32>) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            probability: p,
        }
    }

    #[test]
    fn radar_closes_the_loop_and_skips_nulls() {
        let moods = vec![
            score("mood_happy", Some(0.8)),
            score("mood_sad", None),
            score("mood_party", Some(0.3)),
        ];
        let fig = mood_radar(&moods).unwrap();
        let theta = fig["data"][0]["theta"].as_array().unwrap();
        assert_eq!(theta.len(), 3);
        assert_eq!(theta[0], "Happy");
        assert_eq!(theta[2], "Happy");
        assert_eq!(fig["layout"]["polar"]["radialaxis"]["range"], json!([0, 1]));
    }

    #[test]
    fn bars_keep_the_top_ten_in_order() {
        let scores: Vec<LabelScore> = (0..15)
            .map(|i| score(&format!("l{i}"), Some(i as f32 / 20.0)))
            .collect();
        let fig = instrument_bars(&scores).unwrap();
        let x = fig["data"][0]["x"].as_array().unwrap();
        assert_eq!(x.len(), TOP_CHART_ITEMS);
        assert_eq!(x[0], "l14");

        let themes = theme_bars(&scores).unwrap();
        let y = themes["data"][0]["y"].as_array().unwrap();
        assert_eq!(y.last().unwrap(), "l14");
    }

    #[test]
    fn nothing_to_draw_without_scores() {
        assert!(mood_radar(&[score("mood_sad", None)]).is_none());
        assert!(instrument_bars(&[]).is_none());
        assert!(theme_bars(&[]).is_none());
    }
}
