/// Format an amount as whole Rupiah with thousands separators: Rp1,234,567
pub fn money(val: f64) -> String {
    let rounded = val.round();
    let negative = rounded < 0.0;
    let int_part = format!("{:.0}", rounded.abs());

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-Rp{with_commas}")
    } else {
        format!("Rp{with_commas}")
    }
}

pub fn pct(val: f64) -> String {
    format!("{val:.2}%")
}

/// Percentage change from `previous` to `current`; zero when there is no base.
pub fn pct_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}
