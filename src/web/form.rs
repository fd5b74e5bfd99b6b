//! Input form served at `GET /`.

use std::fmt::Write;

enum Widget {
    /// Numeric input: min, max, step, default
    Number(f64, f64, f64, f64),
    /// 0/1 radio group with its default
    Binary(u8),
}

const WIDGETS: [(&str, &str, Widget); 11] = [
    ("age", "Age", Widget::Number(18.0, 120.0, 1.0, 60.0)),
    ("sex", "Sex (0=female, 1=male)", Widget::Binary(1)),
    ("smoking", "Smoking", Widget::Binary(0)),
    ("anaemia", "Anaemia", Widget::Binary(0)),
    ("diabetes", "Diabetes", Widget::Binary(0)),
    ("high_blood_pressure", "High Blood Pressure", Widget::Binary(0)),
    ("ejection_fraction", "Ejection Fraction", Widget::Number(5.0, 85.0, 1.0, 35.0)),
    (
        "creatinine_phosphokinase",
        "Creatinine Phosphokinase",
        Widget::Number(10.0, 20_000.0, 1.0, 250.0),
    ),
    (
        "platelets",
        "Platelets",
        Widget::Number(30_000.0, 1_000_000.0, 1000.0, 250_000.0),
    ),
    (
        "serum_creatinine",
        "Serum Creatinine",
        Widget::Number(0.2, 15.0, 0.01, 1.1),
    ),
    ("serum_sodium", "Serum Sodium", Widget::Number(110.0, 170.0, 1.0, 138.0)),
];

pub(crate) fn render() -> String {
    let mut fields = String::new();
    for (name, label, widget) in &WIDGETS {
        // Writing to a String cannot fail.
        let _ = match widget {
            Widget::Number(min, max, step, value) => writeln!(
                fields,
                r#"<label>{label}<input type="number" name="{name}" min="{min}" max="{max}" step="{step}" value="{value}" required></label>"#
            ),
            Widget::Binary(default) => {
                let radios: String = (0..=1u8)
                    .map(|v| {
                        let checked = if v == *default { " checked" } else { "" };
                        format!(r#"<input type="radio" name="{name}" value="{v}"{checked}> {v}"#)
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(fields, "<fieldset><legend>{label}</legend>{radios}</fieldset>")
            }
        };
    }

    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Heart Failure Risk Predictor</title></head>
<body>
<h1>Heart Failure Risk Predictor</h1>
<p>Enter the clinical values and submit to estimate the risk of a death event.</p>
<form method="post" action="/predict">
{fields}<button type="submit">Predict</button>
</form>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widgets_cover_every_field_once() {
        let mut names: Vec<&str> = WIDGETS.iter().map(|(name, _, _)| *name).collect();
        names.sort_unstable();
        let mut expected = crate::domain::FIELD_NAMES.to_vec();
        expected.sort_unstable();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_defaults_rendered() {
        let html = render();
        assert!(html.contains(r#"name="age" min="18" max="120" step="1" value="60""#));
        assert!(html.contains(r#"name="sex" value="1" checked"#));
        assert!(html.contains(r#"name="serum_creatinine" min="0.2" max="15" step="0.01" value="1.1""#));
    }
}
