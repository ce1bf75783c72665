//! Food recognition requests and the Gemini `generateContent` wire format.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const PROMPT: &str = "\
You are a professional nutritionist. Analyse the food information the user provides \
(a text description, one or more photos, or both).
Tasks:
1. Identify every food item. If there are several images, identify the foods in each one.
2. For each item estimate calories (kcal), carbohydrates (g), protein (g) and fat (g).
3. Sugar-free drinks, plain water, black coffee and similar have 0 or near-0 calories and macros.
4. If one image contains several foods, list each food separately.

Reply with a JSON array only, no markdown and no commentary, exactly in this shape:
[
  {\"name\": \"food name 1\", \"calories\": 0, \"carbs\": 0, \"protein\": 0, \"fat\": 0},
  {\"name\": \"food name 2\", \"calories\": 0, \"carbs\": 0, \"protein\": 0, \"fat\": 0}
]";

/// What the caller wants recognised. `images` supersedes the single `image`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl RecognitionRequest {
    #[must_use]
    pub fn text_description(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn image_list(&self) -> Vec<&str> {
        match (&self.images, &self.image) {
            (Some(images), _) => images.iter().map(String::as_str).collect(),
            (None, Some(image)) => vec![image.as_str()],
            (None, None) => Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.text_description().is_none() && self.image_list().is_empty() {
            return Err(Error::invalid(
                "Provide a text description or at least one image",
            ));
        }
        for image in self.image_list() {
            InlineData::from_data_url(image)?;
        }
        Ok(())
    }
}

#[must_use]
pub fn build_prompt(text: Option<&str>) -> String {
    match text {
        Some(text) => format!("{PROMPT}\n\nUser description: {text}"),
        None => PROMPT.to_string(),
    }
}

// --- Request body ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl InlineData {
    /// Split `data:<mime>;base64,<payload>` into its mime type and payload.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| Error::invalid("Image must be a data URL (data:<mime>;base64,...)"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| Error::invalid("Image data URL has no payload"))?;
        let mime_type = header.split(';').next().unwrap_or_default().trim();
        if mime_type.is_empty() || data.is_empty() {
            return Err(Error::invalid("Image data URL is missing a mime type or data"));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// One user turn: the prompt first, then every image in order.
    pub fn from_recognition(request: &RecognitionRequest) -> Result<Self> {
        request.validate()?;
        let mut parts = vec![Part::Text {
            text: build_prompt(request.text_description()),
        }];
        for image in request.image_list() {
            parts.push(Part::InlineData {
                inline_data: InlineData::from_data_url(image)?,
            });
        }
        Ok(Self {
            contents: vec![Content { parts }],
        })
    }
}

// --- Response body ---

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseCandidate {
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it produced any.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}
