//! Static listing page and the value formatting shared with chat embeds.
use crate::model::Listing;

pub const CURRENCY_SYMBOL: &str = "£";

/// `£1,234,567.89`
pub fn format_price(price: f64) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if price < 0.0 { "-" } else { "" };
    format!("{sign}{CURRENCY_SYMBOL}{grouped}.{frac}")
}

/// Fraction in `[0, 1]` as `12.5%`.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

pub fn format_age(age: u32) -> String {
    format!("{age} years")
}

pub fn format_hours(hours: f64) -> String {
    format!("{hours:.1} hours")
}

pub fn format_time_left(time_left: i64) -> String {
    format!("{time_left} hours")
}

/// Join the public image base URL with a file name.
pub fn image_url(base: &str, file_name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{file_name}")
    } else {
        format!("{base}/{file_name}")
    }
}

/// Render the full page for the given listings in order.
pub fn render_page(listings: &[Listing], image_base_url: &str) -> String {
    let mut body = String::new();
    for l in listings {
        body.push_str(&render_card(l, image_base_url));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Vehicles on Sale</title>
    <style>{}</style>
  </head>
  <body>
    <h1>Vehicles on Sale</h1>
    <div id="vehicleContainer">
{}    </div>
  </body>
</html>
"#,
        DEFAULT_STYLE, body
    )
}

fn render_card(l: &Listing, image_base_url: &str) -> String {
    let mut card = String::from("      <div class=\"vehicle-card\">\n");
    let mut row = |class: &str, text: String| {
        card.push_str(&format!(
            "        <div class=\"{}\">{}</div>\n",
            class,
            html_escape(&text)
        ));
    };
    row("vehicle-title", l.name.clone());
    row("vehicle-details", format!("Price: {}", format_price(l.price)));
    row("vehicle-details", format!("Age: {}", format_age(l.age)));
    row("vehicle-details", format!("Damage: {}", format_percent(l.damage)));
    row("vehicle-details", format!("Wear: {}", format_percent(l.wear)));
    row(
        "vehicle-details",
        format!("Operating Time: {}", format_hours(l.operating_hours())),
    );
    row(
        "vehicle-details",
        format!("Time Left: {}", format_time_left(l.time_left)),
    );
    row("vehicle-detailstime", l.time_left.to_string());
    row("vehicle-details", format!("Brand: {}", l.brand));
    row("vehicle-details", format!("Category: {}", l.category));
    row("vehicle-details", format!("Specs: {}", l.specs));

    if let Some(file_name) = l.image_file_name() {
        card.push_str(&format!(
            "        <div class=\"vehicle-details\"><a href=\"{}\" target=\"_blank\"><img src=\"{}\" alt=\"{} image\" class=\"vehicle-image\" /></a></div>\n",
            html_attr(&image_url(image_base_url, file_name)),
            html_attr(&image_url(image_base_url, file_name)),
            html_attr(&l.name)
        ));
    }
    card.push_str("      </div>\n");
    card
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn html_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}

const DEFAULT_STYLE: &str = r#"
      body { font-family: Arial, sans-serif; }
      .vehicle-card { border: 1px solid #ccc; padding: 10px; margin: 10px; }
      .vehicle-title { font-size: 1.2em; font-weight: bold; }
      .vehicle-details { margin-top: 5px; }
      .vehicle-detailstime { display: none; }
      .vehicle-image { width: 100px; height: auto; }
    "#;
