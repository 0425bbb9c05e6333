use qrcode::{render::unicode, QrCode};

/// Render a pairing payload as a half-block QR code for the terminal.
pub fn render_qr(code: &str) -> Option<String> {
    let qr = QrCode::new(code.as_bytes()).ok()?;
    Some(
        qr.render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(true)
            .build(),
    )
}

pub fn show_pairing_code(code: &str) {
    println!("Scan the following QR code:");
    match render_qr(code) {
        Some(rendered) => println!("{rendered}"),
        None => println!("Raw pairing code: {code}"),
    }
    println!("You can press Ctrl+C to cancel.");
}
