//! Style presets and the final prompt template for icon generation.

/// A named visual style applied to every icon in a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StylePreset {
    pub id: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub style_prompt: &'static str,
}

pub const STYLE_PRESETS: &[StylePreset] = &[
    StylePreset {
        id: 1,
        name: "Soft Pastel Outline Icon",
        description: "Soft pastel hand-drawn icon with thin rounded outline and gentle shading.",
        style_prompt: "Soft pastel hand-drawn icon style with a thin rounded colored outline and soft pastel colors fully filling the main object, no large white uncolored areas. Gentle soft shading, smooth edges, minimal detail, friendly cute proportions, one simple object centered in the frame, no extra background shapes or scenery. full-color pastel icon, thin outline, solid pastel fills, soft shading, smooth edges, kawaii, vector-like illustration, filled shapes, minimal detail, not black and white, not line art only",
    },
    StylePreset {
        id: 2,
        name: "Playful Doodle Orbit",
        description: "Playful doodle icon with uneven outlines, stars and dots, and a circular pastel backdrop.",
        style_prompt: "Playful hand-drawn doodle icon style with a slightly uneven dark outline around the main object, full-color pastel fills, and a soft circular pastel backdrop behind it. Small colorful decorative stars and dots orbiting around the object, cheerful and whimsical mood, minimal detail, vector-like look, one clear object in the center. playful doodle, sketchy outline, full-color pastel fills, circular pastel background, decorative stars, confetti dots, whimsical, minimal detail, vector style, filled shapes, not black and white, not line art only",
    },
    StylePreset {
        id: 3,
        name: "Storybook Sketch Cloudscape",
        description: "Colorful storybook-style illustration with pastel cloud splash and small accents.",
        style_prompt: "Cute full-color storybook cartoon illustration style with slightly uneven dark outlines and soft brush-like strokes. Solid pastel and soft vibrant colors fully filling the object, gentle shading, rounded and friendly proportions. The object sits over a soft mint cloud-shaped background splash with subtly textured edges, with a few fluffy cartoon clouds and small stars around it, dreamy and whimsical mood, one main object. storybook cartoon illustration, full color, solid pastel fills, soft vibrant colors, sketchy outline, fluffy clouds, small stars, mint cloud backdrop, whimsical, filled shapes, minimal detail",
    },
    StylePreset {
        id: 4,
        name: "Glossy Gradient Icon",
        description: "Modern glossy gradient vector icon of a single toy-like object with smooth lighting.",
        style_prompt: "A single small toy-like object shown as a modern glossy gradient icon, with smooth blended color gradients on the object, soft highlights and subtle shading, bright but harmonious colors, clean rounded geometric forms, slightly 3D lighting, crisp but smooth edges, minimal detail, cute and friendly character-like feeling. Background should be plain or a very soft halo so the object stands out, no complex scenery or extra shapes. glossy 3D toy icon, smooth gradients, soft highlight, clean rounded shapes, minimal detail, cute character, polished modern style, plain background, no complex scene",
    },
    StylePreset {
        id: 5,
        name: "Monochrome Badge Silhouette",
        description: "Strict two-color silhouette icon: one solid circle and one solid object shape, no outlines, no shading, no details.",
        style_prompt: "A very simple two-color pictogram icon made of only a solid circular badge and one solid silhouette of the object inside it. Use exactly two flat colors total: one flat color for the circle and one flat contrasting color for the silhouette. The silhouette must be a completely filled shape with no interior lines, no face details, no separate colored parts, no outlines or strokes, no gradients, no shadows, no glow, no texture, and no extra decorations. No additional background shapes or scenery, only the circle and the silhouette. Clean, minimal, flat vector symbol, centered composition. two-color icon only, solid circle background, solid silhouette shape, flat vector, no shading, no gradients, no outline, no interior details, high contrast, minimal, logo-like, no text",
    },
];

pub fn find_style(style_id: u8) -> Option<&'static StylePreset> {
    STYLE_PRESETS.iter().find(|s| s.id == style_id)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Invalid style ID: {0}")]
    UnknownStyle(u8),
}

/// Turns an object phrase, style and palette into the text sent to the image model.
pub trait PromptBuilder: Send + Sync {
    fn build(&self, object: &str, style_id: u8, colors: Option<&[String]>) -> Result<String, PromptError>;
}

/// Prompt builder backed by [`STYLE_PRESETS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StylePromptBuilder;

impl PromptBuilder for StylePromptBuilder {
    fn build(&self, object: &str, style_id: u8, colors: Option<&[String]>) -> Result<String, PromptError> {
        let style = find_style(style_id).ok_or(PromptError::UnknownStyle(style_id))?;
        let subject = resolve_subject(object);

        let mut prompt = format!(
            "A small illustrated icon of {subject}. \
             It must be a physical real-world object, not text, not a label, not a sign, and not a logo or UI element. \
             Draw it in the following visual style: {}",
            style.style_prompt
        );

        if let Some(colors) = colors.filter(|c| !c.is_empty()) {
            prompt.push_str(&format!(
                " Use {} as the main colors of the object whenever it makes sense.",
                colors.join(" and ")
            ));
        }

        prompt.push_str(
            " Only one object in the image. No text, no words, no letters, no labels, no logos. \
             Icon-style composition with a single centered subject on a transparent background, \
             no extra objects or scenery.",
        );

        Ok(prompt)
    }
}

fn is_category_word(word: &str) -> bool {
    word.len() > 2 && !word.ends_with("ss") && word.ends_with('s')
}

/// Steer broad category words toward a single concrete example.
///
/// Multi-word phrases ("Bear Toy") are already concrete and pass through.
fn resolve_subject(object: &str) -> String {
    let raw = object.trim();
    if raw.contains(char::is_whitespace) {
        return format!("a single {raw}");
    }
    let word = raw.to_lowercase();

    if word.contains("toy") {
        return "a single children's toy such as a teddy bear, toy car, stuffed animal, doll, robot toy, ball, or building block".to_string();
    }
    if word.contains("car") || word.contains("vehicle") {
        return "a single car such as a sedan, SUV, sports car, hatchback, or compact city car".to_string();
    }
    if word.contains("animal") || word.contains("pet") {
        return "a single cute animal such as a cat, dog, rabbit, bear, or similar pet-like creature".to_string();
    }
    if word.contains("food") || word.contains("snack") {
        return "a single piece of food or snack such as a cookie, cupcake, ice cream, slice of pizza, or candy".to_string();
    }
    if word.contains("fruit") {
        return "a single fruit such as an apple, banana, strawberry, orange, or bunch of grapes".to_string();
    }
    if word.contains("vegetable") {
        return "a single vegetable such as a carrot, tomato, broccoli floret, or bell pepper".to_string();
    }
    if is_category_word(&word) {
        return format!("a single everyday object that is a typical, easily recognizable example of \"{raw}\"");
    }

    format!("a single {raw}")
}
