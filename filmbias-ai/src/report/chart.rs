//! SVG bar charts
//!
//! Plain SVG text, one bar per category, bar height proportional to the
//! category's severity sum.

use crate::aggregation::AggregateScore;

const HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 120.0;
const BAR_SLOT: f64 = 56.0;
const MIN_WIDTH: f64 = 480.0;

/// Bar chart of category sums for one aggregate
pub fn aggregate_chart(title: &str, aggregate: &AggregateScore) -> String {
    let bars: Vec<(String, f64)> = aggregate
        .by_category
        .iter()
        .map(|(category, cell)| (category.to_string(), cell.sum))
        .collect();
    bar_chart_svg(title, &bars)
}

/// Render labelled values as an SVG bar chart
pub fn bar_chart_svg(title: &str, bars: &[(String, f64)]) -> String {
    let width = (MARGIN_LEFT + MARGIN_RIGHT + BAR_SLOT * bars.len() as f64).max(MIN_WIDTH);
    let plot_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = HEIGHT - MARGIN_BOTTOM;
    let max = bars
        .iter()
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">
<rect width="100%" height="100%" fill="white"/>
<text x="{cx}" y="28" font-size="16" text-anchor="middle">{title}</text>
<line x1="{ml}" y1="{base}" x2="{xr}" y2="{base}" stroke="black"/>
<line x1="{ml}" y1="{mt}" x2="{ml}" y2="{base}" stroke="black"/>
"#,
        w = width,
        h = HEIGHT,
        cx = width / 2.0,
        title = escape_xml(title),
        ml = MARGIN_LEFT,
        mt = MARGIN_TOP,
        base = baseline,
        xr = width - MARGIN_RIGHT,
    );

    if max <= 0.0 {
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" font-size=\"13\" text-anchor=\"middle\" fill=\"#666\">No stereotype matches</text>\n",
            width / 2.0,
            MARGIN_TOP + plot_height / 2.0
        ));
    } else {
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" font-size=\"11\" text-anchor=\"end\">{}</text>\n",
            MARGIN_LEFT - 6.0,
            MARGIN_TOP + 4.0,
            format_value(max)
        ));

        for (i, (label, value)) in bars.iter().enumerate() {
            let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
            let bar_height = plot_height * value / max;
            let x = MARGIN_LEFT + BAR_SLOT * i as f64 + 8.0;
            let bar_width = BAR_SLOT - 16.0;
            let center = x + bar_width / 2.0;
            svg.push_str(&format!(
                "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"#4a7ebb\"><title>{}: {}</title></rect>\n",
                x,
                baseline - bar_height,
                bar_width,
                bar_height,
                escape_xml(label),
                format_value(value)
            ));
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"10\" text-anchor=\"middle\">{}</text>\n",
                center,
                baseline - bar_height - 4.0,
                format_value(value)
            ));
            svg.push_str(&format!(
                "<text x=\"{c:.1}\" y=\"{y:.1}\" font-size=\"10\" text-anchor=\"end\" transform=\"rotate(-45 {c:.1} {y:.1})\">{label}</text>\n",
                c = center,
                y = baseline + 14.0,
                label = escape_xml(label)
            ));
        }
    }

    svg.push_str("</svg>\n");
    svg
}

fn format_value(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{}", rounded)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_bar_per_category() {
        let svg = bar_chart_svg(
            "Film <ddlj>",
            &[("passive-agency".to_string(), 6.0), ("caregiver-role".to_string(), 2.0)],
        );
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("fill=\"#4a7ebb\"").count(), 2);
        assert!(svg.contains("Film &lt;ddlj&gt;"));
        assert!(svg.contains(">passive-agency</text>"));
    }

    #[test]
    fn test_empty_chart() {
        let svg = bar_chart_svg("Empty", &[]);
        assert!(svg.contains("No stereotype matches"));
        assert!(!svg.contains("#4a7ebb"));

        let zero = bar_chart_svg("Zero", &[("x".to_string(), 0.0)]);
        assert!(zero.contains("No stereotype matches"));
    }

    #[test]
    fn test_tallest_bar_fills_plot() {
        let svg = bar_chart_svg("T", &[("a".to_string(), 4.0), ("b".to_string(), 1.0)]);
        // plot height = 360 - 50 - 120
        assert!(svg.contains("height=\"190.0\""));
        assert!(svg.contains("height=\"47.5\""));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(2.0), "2");
        assert_eq!(format_value(1.23456), "1.23");
    }
}
