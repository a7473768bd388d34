//! EcoPesca - catch-length estimation from a photo
//!
//! This is the CLI entry point for the ecopesca tool.
//! Run with: cargo run --bin ecopesca -- measure photo.jpg --points 10,20,110,20 --distance 10

use anyhow::{bail, Context};
use ecopesca::config::get_messages;
use ecopesca::{
    AppSettings, AuthClient, CalibrationMode, CalibrationPoint, CatchRecord, DetectorClient,
    NewAccount, RecordClient, SessionController, SessionPhase,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let settings = apply_env_overrides(AppSettings::load());

    match args.first().map(String::as_str) {
        Some("measure") => measure(&settings, &args[1..]).await,
        Some("submit") => submit(&settings, &args[1..]).await,
        Some("login") => login(&settings, &args[1..]).await,
        Some("register") => register(&settings, &args[1..]).await,
        Some("reset-request") => reset_request(&settings, &args[1..]).await,
        Some("reset-confirm") => reset_confirm(&settings, &args[1..]).await,
        Some("config") => show_config(&settings, &args[1..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("🐟 EcoPesca - catch-length estimation");
    println!();
    println!("Usage:");
    println!("  ecopesca measure <image> --points x1,y1,x2,y2 [--distance 10] [--preview WxH]");
    println!("  ecopesca measure <image> --reference [--reference-class coin] [--reference-size 2.7]");
    println!("  ecopesca submit --name <name> --area \"Área 1\" [--length 32.5] [--popular <name>]");
    println!("  ecopesca login --email <email> [--password <pwd>] [--save]");
    println!("  ecopesca register --name <name> --email <email> [--password <pwd>] [--avatar <uri>]");
    println!("  ecopesca reset-request --email <email>");
    println!("  ecopesca reset-confirm --email <email> --code <code> [--password <new pwd>]");
    println!("  ecopesca config [--save]");
    println!();
    println!("The password may also be given in API_PASSWORD.");
}

/// Override persisted settings with environment variables.
fn apply_env_overrides(mut settings: AppSettings) -> AppSettings {
    let var = |key: &str| env::var(key).ok().filter(|v| !v.is_empty());

    if let Some(v) = var("DETECTOR_BASE_URL") {
        settings.detector_base_url = v;
    }
    if let Some(v) = var("DETECTOR_API_KEY") {
        settings.detector_api_key = v;
    }
    if let Some(v) = var("DETECTOR_MODEL") {
        settings.detector_model = v;
    }
    if let Some(v) = var("DETECTOR_VERSION") {
        settings.detector_version = v;
    }
    if let Some(v) = var("REFERENCE_MODEL") {
        settings.reference_model = v;
    }
    if let Some(v) = var("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("API_TOKEN") {
        settings.api_token = v;
    }
    if let Some(v) = var("APP_LANG") {
        settings.lang = v;
    }
    settings
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// `--password`, else `API_PASSWORD`.
fn password_arg(args: &[String]) -> String {
    flag_value(args, "--password")
        .map(str::to_string)
        .or_else(|| env::var("API_PASSWORD").ok())
        .unwrap_or_default()
}

/// Parse "x1,y1,x2,y2" (any separators) into tap points.
fn parse_points(text: &str) -> anyhow::Result<Vec<CalibrationPoint>> {
    let numbers: Vec<f64> = NUMBER
        .find_iter(text)
        .map(|m| m.as_str().parse::<f64>())
        .collect::<Result<_, _>>()?;
    if numbers.len() != 4 {
        bail!("expected 4 numbers (x1,y1,x2,y2), got {}", numbers.len());
    }
    Ok(numbers
        .chunks(2)
        .map(|pair| CalibrationPoint::new(pair[0], pair[1]))
        .collect())
}

/// Parse "WxH" into a preview size.
fn parse_size(text: &str) -> anyhow::Result<(f64, f64)> {
    let numbers: Vec<f64> = NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    match numbers.as_slice() {
        [w, h] if *w > 0.0 && *h > 0.0 => Ok((*w, *h)),
        _ => bail!("invalid preview size: {}", text),
    }
}

async fn measure(settings: &AppSettings, args: &[String]) -> anyhow::Result<()> {
    let messages = get_messages(&settings.lang);
    let Some(image_path) = args.first().filter(|a| !a.starts_with("--")) else {
        print_usage();
        return Ok(());
    };

    let mut settings = settings.clone();
    if has_flag(args, "--reference") {
        settings.calibration_mode = CalibrationMode::ReferenceObject;
    }
    if let Some(class) = flag_value(args, "--reference-class") {
        settings.reference_class = class.to_string();
    }
    if let Some(size) = flag_value(args, "--reference-size") {
        settings.reference_size_cm = size.parse().context("invalid --reference-size")?;
    }

    let image = std::fs::read(image_path).with_context(|| format!("failed to read {}", image_path))?;
    let dimensions = image::image_dimensions(Path::new(image_path)).ok();

    let subject_client = DetectorClient::new(settings.detector_config());
    let reference_client = settings.reference_detector_config().map(DetectorClient::new);

    println!("🐟 EcoPesca - catch-length estimation");
    println!("================================================");
    println!(
        "Detector: {} v{} @ {}",
        settings.detector_model, settings.detector_version, settings.detector_base_url
    );
    if let Some(ref client) = reference_client {
        println!("Reference model: {}", client.config().model);
    }
    println!("Mode: {:?}", settings.calibration_mode);
    println!("================================================\n");

    let mut controller = SessionController::new(settings.estimator_settings());
    controller.capture_and_detect(
        Some(image_path.to_string()),
        image,
        &subject_client,
        reference_client.as_ref(),
    );
    if let Some((w, h)) = dimensions {
        controller.session_mut().set_image_size(w, h);
    }
    controller.settle().await;

    let detections = controller.session().all_detections();
    if detections.is_empty() {
        println!("⚠️ {}: {}", messages.detection, messages.detection_failed);
        println!("   {}", messages.manual_entry_hint);
        return Ok(());
    }
    for d in &detections {
        println!(
            "🎯 {} {:.0}% at ({:.0}, {:.0}) size {:.0}x{:.0}",
            d.class,
            d.confidence * 100.0,
            d.x,
            d.y,
            d.width,
            d.height
        );
    }

    if settings.calibration_mode == CalibrationMode::TwoPoint {
        let session = controller.session_mut();
        if let Some(preview) = flag_value(args, "--preview") {
            let (w, h) = parse_size(preview)?;
            session.set_preview_size(w, h);
        }
        let points = match flag_value(args, "--points") {
            Some(text) => parse_points(text)?,
            None => Vec::new(),
        };
        for point in points {
            session.tap(point);
        }
        let distance = flag_value(args, "--distance")
            .map(str::to_string)
            .unwrap_or_else(|| settings.default_ruler_cm.to_string());
        // Result is recorded in the session phase.
        let _ = session.estimate_two_points_input(&distance);
    }

    match controller.session().phase() {
        SessionPhase::Estimated(estimate) => {
            println!(
                "\n✅ {}: {:.1} cm ({:.2} px/cm)",
                messages.estimated_length, estimate.length_cm, estimate.pixels_per_cm
            );
        }
        SessionPhase::Unavailable(e) => {
            println!("\n⚠️ {}: {}", messages.calibration, e.user_message(&settings.lang));
            println!("   {}", messages.manual_entry_hint);
        }
        other => {
            println!("\n⚠️ {}: {:?}", messages.calibration, other);
        }
    }

    Ok(())
}

async fn submit(settings: &AppSettings, args: &[String]) -> anyhow::Result<()> {
    let messages = get_messages(&settings.lang);
    let name = flag_value(args, "--name").unwrap_or_default();
    let area = flag_value(args, "--area").unwrap_or_default();

    let mut record = CatchRecord::new(name, area);
    if let Some(popular) = flag_value(args, "--popular") {
        record = record.with_popular_name(popular);
    }
    if let Some(length) = flag_value(args, "--length") {
        if let Err(e) = record.set_length_input(length) {
            println!("⚠️ {}: {}", messages.validation, e.user_message(&settings.lang));
            return Ok(());
        }
    }

    let client = RecordClient::new(&settings.api_base_url).with_token(&settings.api_token);
    match client.submit(&record).await {
        Ok(id) => println!("✅ {} (#{})", messages.record_saved, id),
        Err(e) => eprintln!("❌ {}", e.user_message(&settings.lang)),
    }
    Ok(())
}

async fn login(settings: &AppSettings, args: &[String]) -> anyhow::Result<()> {
    let messages = get_messages(&settings.lang);
    let email = flag_value(args, "--email").unwrap_or_default();
    let password = password_arg(args);

    let client = AuthClient::new(&settings.api_base_url);
    let session = match client.login(email, &password).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("❌ {}", e.user_message(&settings.lang));
            return Ok(());
        }
    };
    println!("✅ {}, {}!", messages.welcome, session.user.display_name());

    if has_flag(args, "--save") {
        let mut updated = AppSettings::load();
        updated.api_token = session.token;
        updated.save()?;
        println!("Token saved to settings");
    } else {
        println!("API_TOKEN={}", session.token);
    }
    Ok(())
}

async fn register(settings: &AppSettings, args: &[String]) -> anyhow::Result<()> {
    let messages = get_messages(&settings.lang);
    let mut account = NewAccount::new(
        flag_value(args, "--name").unwrap_or_default(),
        flag_value(args, "--email").unwrap_or_default(),
        password_arg(args),
    );
    if let Some(avatar) = flag_value(args, "--avatar") {
        account = account.with_avatar(avatar);
    }

    let client = AuthClient::new(&settings.api_base_url);
    match client.register(&account).await {
        Ok(()) => println!("✅ {}", messages.account_created),
        Err(e) => eprintln!("❌ {}", e.user_message(&settings.lang)),
    }
    Ok(())
}

async fn reset_request(settings: &AppSettings, args: &[String]) -> anyhow::Result<()> {
    let messages = get_messages(&settings.lang);
    let email = flag_value(args, "--email").unwrap_or_default();

    let client = AuthClient::new(&settings.api_base_url);
    match client.request_reset(email).await {
        Ok(dev_code) => {
            println!("✅ {}", messages.reset_code_sent);
            if let Some(code) = dev_code {
                println!("   (dev) code: {}", code);
            }
        }
        Err(e) => eprintln!("❌ {}", e.user_message(&settings.lang)),
    }
    Ok(())
}

async fn reset_confirm(settings: &AppSettings, args: &[String]) -> anyhow::Result<()> {
    let messages = get_messages(&settings.lang);
    let email = flag_value(args, "--email").unwrap_or_default();
    let code = flag_value(args, "--code").unwrap_or_default();

    let client = AuthClient::new(&settings.api_base_url);
    match client.confirm_reset(email, code, &password_arg(args)).await {
        Ok(()) => println!("✅ {}", messages.password_changed),
        Err(e) => eprintln!("❌ {}", e.user_message(&settings.lang)),
    }
    Ok(())
}

fn show_config(settings: &AppSettings, args: &[String]) -> anyhow::Result<()> {
    if has_flag(args, "--save") {
        settings.save()?;
        println!("✅ Settings saved");
    }
    match AppSettings::settings_path() {
        Some(path) => println!("Settings file: {}", path.display()),
        None => println!("Settings file: (unavailable)"),
    }
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points() {
        let points = parse_points("10,20;110.5, 20").unwrap();
        assert_eq!(points, vec![CalibrationPoint::new(10.0, 20.0), CalibrationPoint::new(110.5, 20.0)]);
        assert!(parse_points("1,2,3").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480").unwrap(), (640.0, 480.0));
        assert!(parse_size("640").is_err());
    }

    #[test]
    fn test_password_flag() {
        let args: Vec<String> = ["--email", "ana@example.com", "--password", "segredo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(password_arg(&args), "segredo");
    }

    #[test]
    fn test_flag_value() {
        let args: Vec<String> = ["photo.jpg", "--distance", "12"].iter().map(|s| s.to_string()).collect();
        assert_eq!(flag_value(&args, "--distance"), Some("12"));
        assert_eq!(flag_value(&args, "--points"), None);
        assert!(!has_flag(&args, "--reference"));
    }
}
