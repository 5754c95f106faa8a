//! Page Rendering
//!
//! Server-side HTML for the input form and the two explanation charts. The
//! charts are inline SVG built only from an [`AttributionBreakdown`] and the
//! submitted feature values.

use crate::settings::{PlotConfig, Settings};
use stress_service::{
    Assessment, AttributionBreakdown, Feature, FeatureSchema, FeatureVector, ModelInfo,
    FEATURE_DIMENSION,
};

/// Features shown in the first input column
const FIRST_COLUMN: usize = 5;

const ROW_HEIGHT: f64 = 28.0;
const LABEL_WIDTH: f64 = 190.0;
const MARGIN: f64 = 60.0;

/// Everything shown on one page
pub struct PageView<'a> {
    pub settings: &'a Settings,
    pub schema: &'a FeatureSchema,
    pub model: &'a ModelInfo,
    pub version: &'a str,
    /// Field text in canonical order
    pub inputs: Vec<String>,
    pub assessment: Option<&'a Assessment>,
    /// Validation message for the submitted form
    pub error: Option<String>,
}

/// Field text of an untouched form
pub fn default_inputs() -> Vec<String> {
    vec![format!("{:.2}", 0.0); FEATURE_DIMENSION]
}

/// Escape text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the full page
pub fn page(view: &PageView<'_>) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>ACL Stress Prediction</title>\n",
    );
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n<h1>ACL Stress Prediction</h1>\n<div class=\"layout\">\n");

    html.push_str(&sidebar(view));
    html.push_str(&form(view));

    html.push_str("<section class=\"result\">\n");
    if let Some(error) = &view.error {
        html.push_str(&format!("<div class=\"error\">{}</div>\n", escape(error)));
    }
    if let Some(assessment) = view.assessment {
        html.push_str(&result(assessment, view));
    }
    html.push_str("</section>\n</div>\n</body>\n</html>\n");
    html
}

fn sidebar(view: &PageView<'_>) -> String {
    let mut html = String::from("<aside class=\"sidebar\">\n<h2>Versions</h2>\n<ul>\n");
    html.push_str(&format!("<li>Service {}</li>\n", escape(view.version)));
    html.push_str(&format!("<li>Model format: {}</li>\n", view.model.format));
    if let Some(library) = &view.model.library_version {
        html.push_str(&format!("<li>XGBoost {}</li>\n", escape(library)));
    }
    html.push_str(&format!(
        "<li>Objective: {}</li>\n<li>Trees: {}</li>\n</ul>\n</aside>\n",
        escape(&view.model.objective),
        view.model.n_trees
    ));
    html
}

fn form(view: &PageView<'_>) -> String {
    let mut html = String::from("<form method=\"post\" action=\"/\" novalidate>\n");
    for column in [&Feature::ALL[..FIRST_COLUMN], &Feature::ALL[FIRST_COLUMN..]] {
        html.push_str("<div class=\"column\">\n");
        for feature in column {
            let value = view
                .inputs
                .get(feature.index())
                .map(String::as_str)
                .unwrap_or_default();
            html.push_str(&format!(
                "<label for=\"{key}\">{label}</label>\n\
                 <input type=\"number\" step=\"0.1\" id=\"{key}\" name=\"{key}\" value=\"{value}\">\n",
                key = feature.key(),
                label = escape(view.schema.label(*feature)),
                value = escape(value),
            ));
        }
        html.push_str("</div>\n");
    }
    html.push_str("<button type=\"submit\">Predict</button>\n</form>\n");
    html
}

fn result(assessment: &Assessment, view: &PageView<'_>) -> String {
    let mut html = format!(
        "<h2>Predicted ACL stress: <span class=\"prediction\">{}</span></h2>\n",
        assessment.prediction.format(view.settings.decimals)
    );

    match &assessment.explanation {
        Ok(breakdown) => {
            let suffix = if breakdown.used_fallback() {
                html.push_str(&format!(
                    "<div class=\"warning\">TreeSHAP was unavailable; using fallback mode ({})</div>\n",
                    breakdown.method().as_str()
                ));
                " (Fallback)"
            } else {
                ""
            };
            html.push_str(&format!("<h3>Waterfall Plot{suffix}</h3>\n"));
            html.push_str(&waterfall_svg(breakdown, &assessment.features, &view.settings.plot));
            html.push_str(&format!("<h3>Force Plot{suffix}</h3>\n"));
            html.push_str(&force_svg(breakdown, &view.settings.plot));
        }
        Err(e) => {
            html.push_str(&format!(
                "<div class=\"warning\">{}</div>\n",
                escape(&e.to_string())
            ));
        }
    }
    html
}

/// One bar of the waterfall chart
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallRow {
    pub label: String,
    pub value: f64,
    /// Cumulative output before this contribution
    pub start: f64,
}

impl WaterfallRow {
    pub fn end(&self) -> f64 {
        self.start + self.value
    }
}

/// Waterfall rows, largest contribution first.
///
/// At most `max_display` rows; the smallest contributions are merged into a
/// final "other features" row. Accumulation starts from the baseline at the
/// bottom row and ends at the prediction on the top row.
pub fn waterfall_rows(
    breakdown: &AttributionBreakdown,
    features: &FeatureVector,
    max_display: usize,
) -> Vec<WaterfallRow> {
    let ordered = breakdown.to_display_rows();
    let keep = if ordered.len() > max_display {
        max_display.saturating_sub(1)
    } else {
        ordered.len()
    };

    let mut rows: Vec<WaterfallRow> = ordered[..keep]
        .iter()
        .map(|c| {
            let value = Feature::from_index(c.index)
                .map(|f| features.get(f))
                .unwrap_or(f64::NAN);
            WaterfallRow {
                label: format!("{value:.2} = {}", c.feature),
                value: c.value,
                start: 0.0,
            }
        })
        .collect();

    let rest = &ordered[keep..];
    if !rest.is_empty() {
        rows.push(WaterfallRow {
            label: format!("{} other features", rest.len()),
            value: rest.iter().map(|c| c.value).sum(),
            start: 0.0,
        });
    }

    let mut cumulative = breakdown.baseline();
    for row in rows.iter_mut().rev() {
        row.start = cumulative;
        cumulative += row.value;
    }
    rows
}

/// Linear map from model output to x pixels
struct Scale {
    min: f64,
    max: f64,
    left: f64,
    right: f64,
}

impl Scale {
    fn new(values: impl IntoIterator<Item = f64>, left: f64, right: f64) -> Self {
        let (mut min, mut max) = values
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 1.0;
        }
        let pad = ((max - min) * 0.05).max(1e-3);
        min -= pad;
        max += pad;
        Self {
            min,
            max,
            left,
            right,
        }
    }

    fn x(&self, value: f64) -> f64 {
        self.left + (value - self.min) / (self.max - self.min) * (self.right - self.left)
    }
}

fn color(value: f64, plot: &PlotConfig) -> &str {
    if value >= 0.0 {
        &plot.positive_color
    } else {
        &plot.negative_color
    }
}

/// Waterfall chart as inline SVG
pub fn waterfall_svg(
    breakdown: &AttributionBreakdown,
    features: &FeatureVector,
    plot: &PlotConfig,
) -> String {
    let rows = waterfall_rows(breakdown, features, plot.max_display);
    let width = plot.width as f64;
    let top = 30.0;
    let height = top + rows.len() as f64 * ROW_HEIGHT + 40.0;
    let prediction = rows.first().map(WaterfallRow::end).unwrap_or(breakdown.baseline());

    let scale = Scale::new(
        rows.iter()
            .flat_map(|r| [r.start, r.end()])
            .chain([breakdown.baseline()]),
        LABEL_WIDTH,
        width - MARGIN,
    );

    let mut svg = format!(
        "<svg class=\"waterfall\" xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" \
         height=\"{height:.0}\" viewBox=\"0 0 {width:.0} {height:.0}\">\n"
    );
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"18\" text-anchor=\"middle\">f(x) = {:.3}</text>\n",
        scale.x(prediction),
        prediction
    ));

    for (i, row) in rows.iter().enumerate() {
        let y = top + i as f64 * ROW_HEIGHT;
        let (x0, x1) = (scale.x(row.start), scale.x(row.end()));
        let x = x0.min(x1);
        let w = (x1 - x0).abs().max(1.0);
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\">{}</text>\n",
            LABEL_WIDTH - 8.0,
            y + ROW_HEIGHT * 0.6,
            escape(&row.label)
        ));
        svg.push_str(&format!(
            "<rect x=\"{x:.1}\" y=\"{:.1}\" width=\"{w:.1}\" height=\"{:.1}\" fill=\"{}\"/>\n",
            y + 4.0,
            ROW_HEIGHT - 8.0,
            escape(color(row.value, plot))
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" class=\"value\">{:+.3}</text>\n",
            x + w + 4.0,
            y + ROW_HEIGHT * 0.6,
            row.value
        ));
    }

    let axis_y = top + rows.len() as f64 * ROW_HEIGHT + 6.0;
    svg.push_str(&format!(
        "<line x1=\"{LABEL_WIDTH:.1}\" y1=\"{axis_y:.1}\" x2=\"{:.1}\" y2=\"{axis_y:.1}\" stroke=\"#333\"/>\n",
        width - MARGIN
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">E[f(X)] = {:.3}</text>\n",
        scale.x(breakdown.baseline()),
        axis_y + 20.0,
        breakdown.baseline()
    ));
    svg.push_str("</svg>\n");
    svg
}

/// One segment of the force chart
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSegment {
    pub feature: String,
    pub value: f64,
    pub from: f64,
    pub to: f64,
}

/// Force chart segments.
///
/// Positive contributions are stacked leftwards from the prediction, largest
/// nearest to it; negative ones rightwards. Together they span the interval
/// between baseline and prediction plus any cancelling contributions.
pub fn force_segments(breakdown: &AttributionBreakdown) -> Vec<ForceSegment> {
    let prediction = breakdown.reconstructed();
    let rows = breakdown.to_display_rows();
    let mut segments = Vec::with_capacity(rows.len());

    let mut cursor = prediction;
    for c in rows.iter().filter(|c| c.value > 0.0) {
        segments.push(ForceSegment {
            feature: c.feature.clone(),
            value: c.value,
            from: cursor - c.value,
            to: cursor,
        });
        cursor -= c.value;
    }

    let mut cursor = prediction;
    for c in rows.iter().filter(|c| c.value < 0.0) {
        segments.push(ForceSegment {
            feature: c.feature.clone(),
            value: c.value,
            from: cursor,
            to: cursor - c.value,
        });
        cursor -= c.value;
    }
    segments
}

/// Force chart as inline SVG
pub fn force_svg(breakdown: &AttributionBreakdown, plot: &PlotConfig) -> String {
    let segments = force_segments(breakdown);
    let prediction = breakdown.reconstructed();
    let width = plot.width as f64;
    let height = 110.0;
    let bar_y = 40.0;
    let bar_h = 24.0;

    let scale = Scale::new(
        segments
            .iter()
            .flat_map(|s| [s.from, s.to])
            .chain([breakdown.baseline(), prediction]),
        20.0,
        width - 20.0,
    );

    let mut svg = format!(
        "<svg class=\"force\" xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" \
         height=\"{height:.0}\" viewBox=\"0 0 {width:.0} {height:.0}\">\n"
    );
    for segment in &segments {
        let x = scale.x(segment.from);
        let w = (scale.x(segment.to) - x).max(1.0);
        svg.push_str(&format!(
            "<rect x=\"{x:.1}\" y=\"{bar_y:.1}\" width=\"{w:.1}\" height=\"{bar_h:.1}\" \
             fill=\"{}\" stroke=\"#fff\"><title>{} {:+.3}</title></rect>\n",
            escape(color(segment.value, plot)),
            escape(&segment.feature),
            segment.value
        ));
        if w > 40.0 {
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"segment\">{}</text>\n",
                x + w / 2.0,
                bar_y + bar_h + 16.0,
                escape(&segment.feature)
            ));
        }
    }

    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"24\" text-anchor=\"middle\" font-weight=\"bold\">f(x) = {:.3}</text>\n",
        scale.x(prediction),
        prediction
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">base value = {:.3}</text>\n",
        scale.x(breakdown.baseline()),
        height - 6.0,
        breakdown.baseline()
    ));
    svg.push_str("</svg>\n");
    svg
}

const STYLE: &str = "<style>\n\
body { font-family: sans-serif; margin: 1.5rem; }\n\
.layout { display: flex; gap: 2rem; align-items: flex-start; }\n\
.sidebar { min-width: 12rem; font-size: 0.9rem; color: #555; }\n\
form { display: flex; flex-wrap: wrap; gap: 1.5rem; }\n\
.column { display: flex; flex-direction: column; gap: 0.3rem; }\n\
button { align-self: flex-end; }\n\
.error { color: #b00020; }\n\
.warning { background: #fff4e5; padding: 0.5rem; }\n\
svg text { font-size: 12px; }\n\
</style>\n";

#[cfg(test)]
mod tests {
    use super::*;
    use stress_service::{AttributionMethod, ModelFormat, Prediction, ServiceError};

    fn model() -> ModelInfo {
        ModelInfo {
            format: ModelFormat::XgboostJson,
            library_version: Some("2.0.3".to_string()),
            objective: "reg:squarederror".to_string(),
            n_trees: 4,
            n_features: 9,
            base_score: 30.0,
        }
    }

    fn breakdown(used_fallback: bool) -> AttributionBreakdown {
        let names = FeatureSchema::default().short_names().to_vec();
        AttributionBreakdown::new(
            30.0,
            &[0.5, -0.2, 0.1, 0.0, 0.0, 1.5, -0.05, 0.3, -0.4],
            &names,
            AttributionMethod::TreeShap,
            used_fallback,
        )
        .unwrap()
    }

    fn assessment(explanation: Result<AttributionBreakdown, ServiceError>) -> Assessment {
        Assessment {
            features: FeatureVector::zeros(),
            prediction: Prediction { value: 31.75 },
            explanation,
        }
    }

    fn render(settings: &Settings, assessment: Option<&Assessment>) -> String {
        let schema = FeatureSchema::default();
        let model = model();
        page(&PageView {
            settings,
            schema: &schema,
            model: &model,
            version: "0.1.0",
            inputs: default_inputs(),
            assessment,
            error: None,
        })
    }

    #[test]
    fn test_empty_form() {
        let html = render(&Settings::default(), None);
        assert_eq!(html.matches("<input type=\"number\" step=\"0.1\"").count(), 9);
        assert_eq!(html.matches("value=\"0.00\"").count(), 9);
        assert!(html.contains("Hamstring/Quadriceps(H/Q)"));
        assert!(html.contains("XGBoost 2.0.3"));
        assert!(!html.contains("Waterfall"));
    }

    #[test]
    fn test_result_with_charts() {
        let a = assessment(Ok(breakdown(false)));
        let html = render(&Settings::default(), Some(&a));
        assert!(html.contains("31.750"));
        assert!(html.contains("<h3>Waterfall Plot</h3>"));
        assert!(html.contains("<h3>Force Plot</h3>"));
        assert!(!html.contains("(Fallback)"));
        assert!(!html.contains("class=\"warning\""));
    }

    #[test]
    fn test_fallback_label() {
        let a = assessment(Ok(breakdown(true)));
        let html = render(&Settings::default(), Some(&a));
        assert!(html.contains("Waterfall Plot (Fallback)"));
        assert!(html.contains("class=\"warning\""));
        assert!(html.contains("using fallback mode"));
    }

    #[test]
    fn test_unavailable_explanation_keeps_prediction() {
        let a = assessment(Err(ServiceError::ExplanationUnavailable(
            "both methods failed".to_string(),
        )));
        let html = render(&Settings::default(), Some(&a));
        assert!(html.contains("31.750"));
        assert!(html.contains("class=\"warning\""));
        assert!(html.contains("both methods failed"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape("<b>\"H&Q\"</b>"), "&lt;b&gt;&quot;H&amp;Q&quot;&lt;/b&gt;");
        let schema = FeatureSchema::with_names(
            Some((0..9).map(|i| format!("<i>{i}</i>")).collect()),
            None,
        )
        .unwrap();
        let settings = Settings::default();
        let model = model();
        let html = page(&PageView {
            settings: &settings,
            schema: &schema,
            model: &model,
            version: "0.1.0",
            inputs: vec!["\"><script>".to_string(); 9],
            assessment: None,
            error: Some("<bad>".to_string()),
        });
        assert!(!html.contains("<i>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;bad&gt;"));
    }

    #[test]
    fn test_waterfall_rows_merge_and_accumulate() {
        let b = breakdown(false);
        let rows = waterfall_rows(&b, &FeatureVector::zeros(), 4);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].label, "0.00 = KVM");
        assert_eq!(rows[3].label, "6 other features");

        let merged: f64 = [0.1, 0.0, 0.0, -0.05, -0.2, 0.3].iter().sum();
        assert!((rows[3].value - merged).abs() < 1e-12);
        assert!((rows[3].start - b.baseline()).abs() < 1e-12);
        assert!((rows[0].end() - b.reconstructed()).abs() < 1e-12);
    }

    #[test]
    fn test_waterfall_rows_no_merge() {
        let rows = waterfall_rows(&breakdown(false), &FeatureVector::zeros(), 10);
        assert_eq!(rows.len(), 9);
        assert!(rows.iter().all(|r| !r.label.contains("other")));
    }

    #[test]
    fn test_force_segments_span() {
        let b = breakdown(false);
        let segments = force_segments(&b);
        // zero contributions are not drawn
        assert_eq!(segments.len(), 7);

        let positive: f64 = segments.iter().filter(|s| s.value > 0.0).map(|s| s.value).sum();
        let lowest = segments.iter().map(|s| s.from).fold(f64::INFINITY, f64::min);
        assert!((lowest - (b.reconstructed() - positive)).abs() < 1e-12);
        for s in &segments {
            assert!((s.to - s.from - s.value.abs()).abs() < 1e-12);
        }
    }
}
