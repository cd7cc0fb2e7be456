//! HTML for `GET /purchase/new`.

use std::fmt::Write;

use axum::response::Html;

use crate::coins::Coin;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn coin_row(coin: &Coin) -> String {
    let image = coin
        .image
        .as_deref()
        .map(|src| format!(r#"<img src="{}" alt="" width="24" height="24">"#, escape(src)))
        .unwrap_or_default();
    let rank = coin.market_cap_rank.map(|r| r.to_string()).unwrap_or_default();
    let price = coin
        .current_price
        .map(|p| format!("{p:.2}"))
        .unwrap_or_else(|| "n/a".into());
    let change = coin
        .price_change_percentage_24h
        .map(|c| format!("{c:+.2}%"))
        .unwrap_or_default();
    format!(
        r#"<tr data-coin="{id}"><td>{rank}</td><td>{image} {name}</td><td>{symbol}</td><td>{price}</td><td>{change}</td></tr>"#,
        id = escape(&coin.id),
        name = escape(&coin.name),
        symbol = escape(&coin.symbol.to_uppercase()),
    )
}

pub fn render_new(coins: &[Coin]) -> Html<String> {
    let mut rows = String::new();
    for coin in coins {
        // writing into a String cannot fail
        let _ = writeln!(rows, "      {}", coin_row(coin));
    }
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>New purchase</title></head>
<body>
  <h1>New purchase</h1>
  <table class="coins">
    <thead><tr><th>#</th><th>Coin</th><th>Symbol</th><th>Price</th><th>24h</th></tr></thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(id: &str, name: &str) -> Coin {
        Coin {
            id: id.into(),
            symbol: "btc".into(),
            name: name.into(),
            image: Some("https://img/x.png?a=1&b=2".into()),
            current_price: Some(61000.456),
            market_cap_rank: Some(1),
            price_change_percentage_24h: Some(-1.5),
        }
    }

    #[test]
    fn renders_one_row_per_coin_in_order() {
        let Html(page) = render_new(&[coin("bitcoin", "Bitcoin"), coin("ethereum", "Ethereum")]);
        assert_eq!(page.matches("<tr data-coin=").count(), 2);
        let btc = page.find(r#"data-coin="bitcoin""#).unwrap();
        let eth = page.find(r#"data-coin="ethereum""#).unwrap();
        assert!(btc < eth);
        assert!(page.contains("61000.46"));
        assert!(page.contains("-1.50%"));
        assert!(page.contains("BTC"));
    }

    #[test]
    fn escapes_upstream_text() {
        let Html(page) = render_new(&[coin("evil", "<script>alert(1)</script>")]);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("a=1&amp;b=2"));
    }

    #[test]
    fn empty_list_renders_empty_table() {
        let Html(page) = render_new(&[]);
        assert!(page.contains("<tbody>"));
        assert!(!page.contains("<tr data-coin="));
    }
}
