//! Horizontal ASCII bar charts for consumption reports.

/// Bar chart layout options.
#[derive(Debug, Clone, Copy)]
pub struct BarChartOptions {
    /// Width in characters of the longest bar.
    pub width: usize,
    pub fill: char,
    /// Decimals used for the value printed after each bar.
    pub decimals: usize,
}

impl Default for BarChartOptions {
    fn default() -> Self {
        Self {
            width: 40,
            fill: '#',
            decimals: 1,
        }
    }
}

/// Renders `(label, value)` pairs as horizontal bars scaled to the largest
/// absolute value. Negative values are drawn with `-`.
pub fn render_bar_chart(entries: &[(String, f64)], options: BarChartOptions) -> String {
    let label_width = entries
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let max_value = entries
        .iter()
        .map(|(_, value)| value.abs())
        .fold(0.0_f64, f64::max);

    let mut out = String::new();
    for (label, value) in entries {
        let length = if max_value > 0.0 {
            ((value.abs() / max_value) * options.width as f64).round() as usize
        } else {
            0
        };
        let fill = if *value < 0.0 { '-' } else { options.fill };
        let bar: String = std::iter::repeat(fill).take(length).collect();
        let pad = label_width - label.chars().count();
        out.push_str(&format!(
            "{label}{} | {bar} {value:.prec$}\n",
            " ".repeat(pad),
            prec = options.decimals
        ));
    }
    out
}
