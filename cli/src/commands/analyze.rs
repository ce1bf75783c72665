use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

use fitlog_core::models::FoodEntry;
use fitlog_core::recognition::RecognitionRequest;

use super::AppSession;
use super::helpers::{parse_date, print_candidates, prompt_confirm};
use crate::gemini::{FoodRecognizer, analyze_food};

fn image_mime(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    Ok(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => bail!(
            "Unsupported image type: {}. Use jpg, png, webp or heic",
            path.display()
        ),
    })
}

/// Read an image from disk as a base64 `data:` URL.
fn image_data_url(path: &Path) -> Result<String> {
    let mime = image_mime(path)?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_analyze(
    session: &mut AppSession<'_>,
    recognizer: Option<&dyn FoodRecognizer>,
    text: Option<String>,
    images: Vec<PathBuf>,
    log: bool,
    yes: bool,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let Some(recognizer) = recognizer else {
        bail!("Food recognition is not configured. Set GEMINI_API_KEY");
    };
    let date = parse_date(date)?;

    let images = images
        .iter()
        .map(|p| image_data_url(p))
        .collect::<Result<Vec<_>>>()?;
    let request = RecognitionRequest {
        text,
        image: None,
        images: (!images.is_empty()).then_some(images),
    };

    if !json {
        eprintln!("Analyzing food...");
    }
    let candidates = analyze_food(recognizer, &request).await?;

    if !log {
        if json {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        } else {
            print_candidates(&candidates);
        }
        return Ok(());
    }

    if !json {
        print_candidates(&candidates);
    }

    let mut logged: Vec<FoodEntry> = Vec::new();
    for candidate in candidates {
        let accept = yes
            || prompt_confirm(&format!(
                "Log {} ({:.0} kcal) for {date}?",
                candidate.name, candidate.calories
            ))?;
        if !accept {
            continue;
        }
        let created = session.add_food_entry(date, &candidate.into_new_entry())?;
        logged.push(created);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&logged)?);
    } else if logged.is_empty() {
        println!("Nothing logged");
    } else {
        let log = session.log(date);
        println!(
            "Logged {} item(s) for {date}. Day total: {:.0} / {:.0} kcal",
            logged.len(),
            log.calories_intake,
            log.plan().target_calories()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fitlog_core::service::FitlogService;
    use fitlog_core::session::Session;

    struct Canned(&'static str);

    #[async_trait]
    impl FoodRecognizer for Canned {
        async fn recognize(&self, _request: &RecognitionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("a.JPG")).unwrap(), "image/jpeg");
        assert_eq!(image_mime(Path::new("dir/b.png")).unwrap(), "image/png");
        assert!(image_mime(Path::new("notes.txt")).is_err());
        assert!(image_mime(Path::new("noext")).is_err());
    }

    #[test]
    fn test_image_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meal.png");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            image_data_url(&path).unwrap(),
            "data:image/png;base64,YWJj"
        );
    }

    #[tokio::test]
    async fn test_analyze_and_log_all() {
        let svc = FitlogService::new_in_memory().unwrap();
        let mut session = Session::open(&svc, "u1").unwrap();
        let recognizer = Canned(
            r#"[{"name":"Rice","calories":200,"carbs":45,"protein":4,"fat":0.5},
                {"name":"Egg","calories":78,"carbs":0.6,"protein":6,"fat":5}]"#,
        );

        cmd_analyze(
            &mut session,
            Some(&recognizer),
            Some("lunch".into()),
            Vec::new(),
            true,
            true,
            Some("2024-06-15".into()),
            true,
        )
        .await
        .unwrap();

        let log = session.log(parse_date(Some("2024-06-15".into())).unwrap());
        assert_eq!(log.entries.len(), 2);
        assert!((log.calories_intake - 278.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_analyze_without_recognizer_fails() {
        let svc = FitlogService::new_in_memory().unwrap();
        let mut session = Session::open(&svc, "u1").unwrap();
        let err = cmd_analyze(
            &mut session,
            None,
            Some("lunch".into()),
            Vec::new(),
            false,
            false,
            None,
            true,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(session.logs().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_requires_input() {
        let svc = FitlogService::new_in_memory().unwrap();
        let mut session = Session::open(&svc, "u1").unwrap();
        let recognizer = Canned("[]");
        let result = cmd_analyze(
            &mut session,
            Some(&recognizer),
            None,
            Vec::new(),
            false,
            false,
            None,
            true,
        )
        .await;
        assert!(result.is_err());
    }
}
