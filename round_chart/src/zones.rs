// zones.rs - horizontal price bands, one per grid row

/// One row's price band. Row 0 is the top (highest) band.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceZone {
    pub row_index: u32,
    pub price_min: f64,
    pub price_max: f64,
    pub label: String,
}

/// Partition a range centred on `center` into `rows` bands of `band_width` each.
pub fn derive_zones(center: f64, band_width: f64, rows: u32) -> Vec<PriceZone> {
    if rows == 0 || !center.is_finite() || !(band_width > 0.0) {
        return Vec::new();
    }
    let total = band_width * rows as f64;
    let top = center + total / 2.0;

    (0..rows)
        .map(|row| {
            let price_max = top - band_width * row as f64;
            let price_min = price_max - band_width;
            PriceZone {
                row_index: row,
                price_min,
                price_max,
                label: format!("{price_min:.3}-{price_max:.3}"),
            }
        })
        .collect()
}

/// Combined `(min, max)` over all zones.
pub fn zones_range(zones: &[PriceZone]) -> Option<(f64, f64)> {
    let min = zones.iter().map(|z| z.price_min).reduce(f64::min)?;
    let max = zones.iter().map(|z| z.price_max).reduce(f64::max)?;
    Some((min, max))
}

/// True when there are no zones yet or `price` fell outside their combined range.
pub fn needs_rederive(zones: &[PriceZone], price: f64) -> bool {
    match zones_range(zones) {
        Some((min, max)) => price < min || price > max,
        None => true,
    }
}

/// Rows that carry a text label: every row for small grids, otherwise every other row.
pub fn labelled_rows(zones: &[PriceZone]) -> impl Iterator<Item = &PriceZone> {
    let all = zones.len() <= 6;
    zones.iter().filter(move |z| all || z.row_index % 2 == 0)
}
