//! Intent classification strategies.
//!
//! The keyword classifier is the default: it is local and deterministic and
//! keeps a network round-trip off the hot path. The remote classifier asks
//! the text-generation backend for a label and coerces whatever comes back.

use crate::error::AgentError;
use crate::extract::intent_from_output;
use crate::generator::TextGenerator;
use crate::normalize::{contains_phrase, normalize_text};
use async_trait::async_trait;
use domu_types::Intent;
use std::sync::Arc;

/// Maps caller text to exactly one [`Intent`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Intent, AgentError>;
}

// Phrases are stored normalized (lowercase, no accents, no punctuation).

const NOT_INTERESTED_PHRASES: &[&str] = &[
    "no estoy interesado",
    "no estoy interesada",
    "no me interesa",
    "no quiero",
    "no gracias",
    "no por ahora",
    "no tengo plata",
    "no tengo dinero",
    "no me gusta",
    "no me llames",
    "no me vuelvan a llamar",
    "muy caro",
    "demasiado caro",
];

const FOLLOW_UP_PHRASES: &[&str] = &[
    "llamame luego",
    "llamame despues",
    "llamame mas tarde",
    "mas tarde",
    "otro dia",
    "en otro momento",
    "la proxima semana",
    "ahora no puedo",
    "estoy ocupado",
    "estoy ocupada",
];

const INTERESTED_PHRASES: &[&str] = &[
    "si me interesa",
    "me interesa",
    "suena bien",
    "me gusta",
    "quisiera saber mas",
    "quiero saber mas",
    "quiero mas informacion",
    "cuentame mas",
    "cuenteme mas",
    "cuando puedo ir",
    "cuando puedo pasar",
    "quiero verlo",
    "quiero probarlo",
    "prueba de manejo",
    "agendar",
];

/// Rule-based Spanish classifier.
///
/// Checks are ordered: refusals first, then follow-up requests, then
/// interest, then two loose heuristics. Anything else is neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous classification used by the async trait impl.
    pub fn classify_text(&self, text: &str) -> Intent {
        let t = normalize_text(text);
        if t.is_empty() {
            return Intent::Neutral;
        }

        let any = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&t, p));

        if any(NOT_INTERESTED_PHRASES) {
            return Intent::NotInterested;
        }
        if any(FOLLOW_UP_PHRASES) {
            return Intent::FollowUp;
        }
        if any(INTERESTED_PHRASES) {
            return Intent::Interested;
        }

        if contains_phrase(&t, "no") && t.contains("interesa") {
            return Intent::NotInterested;
        }
        if t.contains("interesa") || t.contains("mas informacion") {
            return Intent::Interested;
        }

        Intent::Neutral
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Intent, AgentError> {
        Ok(self.classify_text(text))
    }
}

/// Delegates classification to the text-generation backend.
#[derive(Clone)]
pub struct RemoteClassifier {
    generator: Arc<dyn TextGenerator>,
}

impl RemoteClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt(text: &str) -> String {
        format!(
            "Clasifica la intención de un cliente en una llamada de ventas de carros.\n\
             Categorías posibles: NOT_INTERESTED, INTERESTED, FOLLOW_UP, NEUTRAL.\n\
             Responde únicamente con JSON de la forma {{\"intent\": \"<CATEGORIA>\"}}.\n\n\
             Texto del cliente: \"{}\"",
            text.replace('"', "'")
        )
    }
}

#[async_trait]
impl IntentClassifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<Intent, AgentError> {
        if text.trim().is_empty() {
            return Ok(Intent::Neutral);
        }
        let raw = self
            .generator
            .generate(&Self::prompt(text))
            .await
            .map_err(|e| AgentError::Classification(e.to_string()))?;
        Ok(intent_from_output(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn refusals_are_not_interested() {
        let c = KeywordClassifier::new();
        assert_eq!(c.classify_text("No me interesa, es muy caro"), Intent::NotInterested);
        assert_eq!(c.classify_text("no gracias"), Intent::NotInterested);
        assert_eq!(c.classify_text("Eso está demasiado caro para mí"), Intent::NotInterested);
        assert_eq!(c.classify_text("no, la verdad no me gusta"), Intent::NotInterested);
    }

    #[test]
    fn follow_up_requests_are_detected() {
        let c = KeywordClassifier::new();
        assert_eq!(c.classify_text("Llámame más tarde por favor"), Intent::FollowUp);
        assert_eq!(c.classify_text("ahora no puedo, en otro momento"), Intent::FollowUp);
    }

    #[test]
    fn interest_is_detected() {
        let c = KeywordClassifier::new();
        assert_eq!(c.classify_text("Sí, cuéntame más, ¿cuándo puedo ir?"), Intent::Interested);
        assert_eq!(c.classify_text("suena bien"), Intent::Interested);
        assert_eq!(c.classify_text("me interesaría la versión automática"), Intent::Interested);
    }

    #[test]
    fn everything_else_is_neutral() {
        let c = KeywordClassifier::new();
        assert_eq!(c.classify_text(""), Intent::Neutral);
        assert_eq!(c.classify_text("¿Quién habla?"), Intent::Neutral);
        assert_eq!(c.classify_text("me gustaría saber quién es"), Intent::Neutral);
    }

    struct ScriptedGenerator {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn remote_classifier_coerces_unknown_labels() {
        let generator = Arc::new(ScriptedGenerator {
            reply: "{\"intent\": \"ENTHUSIASTIC\"}".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let classifier = RemoteClassifier::new(generator.clone());

        let intent = classifier.classify("¡me encanta!").await.unwrap();
        assert_eq!(intent, Intent::Neutral);
        assert_eq!(generator.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remote_classifier_skips_backend_for_empty_text() {
        let generator = Arc::new(ScriptedGenerator {
            reply: "INTERESTED".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let classifier = RemoteClassifier::new(generator.clone());

        assert_eq!(classifier.classify("   ").await.unwrap(), Intent::Neutral);
        assert!(generator.prompts.lock().unwrap().is_empty());
        assert_eq!(classifier.classify("dale").await.unwrap(), Intent::Interested);
    }
}
