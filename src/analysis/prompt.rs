//! Fixed instruction sent with every image to the inference model.

/// Prompt asking the model for one JSON nutrition object.
pub const NUTRITION_PROMPT: &str = r#"Analyze this food image and return a JSON object with:
- foodName (string)
- confidence (number 0-1)
- calories (number)
- protein (number in grams)
- carbs (number in grams)
- fats (number in grams)

Example: {"foodName":"apple","confidence":0.9,"calories":52,"protein":0.3,"carbs":14,"fats":0.2}"#;
