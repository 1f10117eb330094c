//! Reply generation under the sales-call policy.
//!
//! The backend drafts the reply from a single prompt. The draft is then held
//! to the policy locally: it is cut to the sentence cap, and a draft that asks
//! for the caller's address, pitches more than two offerings, or comes back
//! empty is replaced by the intent's fallback line.

use crate::error::AgentError;
use crate::generator::TextGenerator;
use crate::history::ConversationTurn;
use crate::normalize::{contains_phrase, normalize_text};
use domu_types::{format_price_millions, Intent, LeadProfile};
use std::fmt::Write as _;
use std::sync::Arc;

/// Most offerings an interested caller may be pitched in one reply.
const MAX_OFFERINGS_PER_REPLY: usize = 2;

/// Normalized phrases that indicate a request for the caller's address.
const ADDRESS_REQUEST_PHRASES: &[&str] = &[
    "tu direccion",
    "su direccion",
    "direccion de tu casa",
    "direccion de su casa",
    "donde vives",
    "donde vive usted",
    "donde resides",
    "donde reside",
];

/// Business rules applied to every reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPolicy {
    pub company: String,
    pub max_sentences: usize,
    /// Fixed catalog the agent may recommend from.
    pub offerings: Vec<String>,
    /// Placeholder meeting points. Never real addresses.
    pub locations: Vec<String>,
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self {
            company: "Domu Autos".to_string(),
            max_sentences: 3,
            offerings: vec![
                "prueba de manejo sin costo".to_string(),
                "plan de financiación hasta 60 meses".to_string(),
                "bono de retoma por tu carro actual".to_string(),
                "mantenimiento gratis el primer año".to_string(),
            ],
            locations: vec![
                "Sala Domu Norte".to_string(),
                "Sala Domu Centro".to_string(),
                "Punto de encuentro virtual Domu".to_string(),
            ],
        }
    }
}

/// Cuts `text` after its first `max` sentences.
///
/// A sentence ends at a run of `.`, `!` or `?` followed by whitespace or the
/// end of the text, so decimals such as `75.0` do not split.
pub fn limit_sentences(text: &str, max: usize) -> String {
    let text = text.trim();
    if max == 0 {
        return String::new();
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut count = 0;
    for (pos, &(idx, c)) in chars.iter().enumerate() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let next = chars.get(pos + 1).map(|&(_, n)| n);
        let ends_sentence = match next {
            None => true,
            Some(n) => n.is_whitespace(),
        };
        if ends_sentence {
            count += 1;
            if count == max {
                return text[..idx + c.len_utf8()].trim().to_string();
            }
        }
    }
    text.to_string()
}

/// Whether the reply asks for the caller's physical address.
pub fn requests_address(text: &str) -> bool {
    let t = normalize_text(text);
    ADDRESS_REQUEST_PHRASES.iter().any(|p| contains_phrase(&t, p))
}

fn name_suffix(lead: &LeadProfile) -> String {
    match lead.first_name() {
        "" => String::new(),
        first => format!(", {}", first),
    }
}

/// Produces the agent's spoken reply for one turn.
#[derive(Clone)]
pub struct ReplyGenerator {
    generator: Arc<dyn TextGenerator>,
    policy: ReplyPolicy,
}

impl ReplyGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: ReplyPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn policy(&self) -> &ReplyPolicy {
        &self.policy
    }

    /// Generates the reply for `user_text`.
    ///
    /// Empty input never reaches the backend: it gets the clarifying question.
    pub async fn generate_reply(
        &self,
        lead: &LeadProfile,
        user_text: &str,
        intent: Intent,
        history: &[ConversationTurn],
    ) -> Result<String, AgentError> {
        if user_text.trim().is_empty() {
            return Ok(self.clarifying_question(lead));
        }

        let prompt = self.build_prompt(lead, user_text, intent, history);
        let draft = self.generator.generate(&prompt).await?;
        Ok(self.finalize(&draft, lead, intent))
    }

    /// Applies the sentence cap and the policy guards to a backend draft.
    pub fn finalize(&self, draft: &str, lead: &LeadProfile, intent: Intent) -> String {
        let reply = limit_sentences(draft, self.policy.max_sentences);

        if reply.is_empty() {
            tracing::warn!(intent = %intent, "backend returned an empty reply; using fallback");
            return self.fallback_reply(lead, intent);
        }
        if requests_address(&reply) {
            tracing::warn!(intent = %intent, "reply asked for the caller's address; using fallback");
            return self.fallback_reply(lead, intent);
        }
        if intent == Intent::Interested && self.offerings_named(&reply) > MAX_OFFERINGS_PER_REPLY {
            tracing::warn!("reply pitched too many offerings; using fallback");
            return self.fallback_reply(lead, intent);
        }

        reply
    }

    /// Number of catalog offerings mentioned in `text`.
    pub fn offerings_named(&self, text: &str) -> usize {
        let t = normalize_text(text);
        self.policy
            .offerings
            .iter()
            .filter(|o| contains_phrase(&t, &normalize_text(o)))
            .count()
    }

    /// Short question used when the caller said nothing intelligible.
    pub fn clarifying_question(&self, lead: &LeadProfile) -> String {
        format!(
            "Disculpa{}, no alcancé a escucharte bien. ¿Te gustaría conocer más sobre el {}?",
            name_suffix(lead),
            lead.vehicle_name
        )
    }

    /// Policy-compliant reply used when the backend draft cannot be used.
    pub fn fallback_reply(&self, lead: &LeadProfile, intent: Intent) -> String {
        let name = name_suffix(lead);
        match intent {
            Intent::NotInterested => format!(
                "Entiendo perfectamente{}, gracias por tu tiempo. \
                 No te insistiré más; si algún día quieres retomar, aquí estaremos.",
                name
            ),
            Intent::FollowUp => format!(
                "Claro{}, con gusto te contactamos en otro momento. ¡Que tengas un excelente día!",
                name
            ),
            Intent::Interested => {
                let offering = self
                    .policy
                    .offerings
                    .first()
                    .map(String::as_str)
                    .unwrap_or("una asesoría personalizada");
                let location = self
                    .policy
                    .locations
                    .first()
                    .map(String::as_str)
                    .unwrap_or("nuestra sala de exhibición");
                format!(
                    "¡Qué bueno{}! Te recomiendo la {} del {}. ¿Qué día te queda bien para vernos en {}?",
                    name, offering, lead.vehicle_name, location
                )
            }
            Intent::Neutral => format!(
                "Perfecto{}. ¿Te gustaría que te cuente más sobre el {}?",
                name, lead.vehicle_name
            ),
        }
    }

    /// Builds the single prompt string sent to the backend.
    pub fn build_prompt(
        &self,
        lead: &LeadProfile,
        user_text: &str,
        intent: Intent,
        history: &[ConversationTurn],
    ) -> String {
        let policy = &self.policy;
        let mut prompt = String::new();

        let _ = writeln!(
            prompt,
            "Eres un asistente profesional de ventas telefónicas para {} en Colombia. \
             Siempre respondes en español latino, con máximo {} oraciones, tono respetuoso y claro.",
            policy.company, policy.max_sentences
        );
        prompt.push('\n');

        prompt.push_str("Información del cliente potencial y del vehículo:\n");
        let _ = writeln!(prompt, "- Nombre del cliente: {}", lead.name);
        let _ = writeln!(prompt, "- Modelo del carro: {}", lead.vehicle_model);
        let _ = writeln!(prompt, "- Nombre comercial del carro: {}", lead.vehicle_name);
        let _ = writeln!(
            prompt,
            "- Precio del carro: {} de pesos colombianos",
            format_price_millions(lead.price)
        );
        prompt.push('\n');

        prompt.push_str("Ofertas disponibles (usa solo estas):\n");
        for offering in &policy.offerings {
            let _ = writeln!(prompt, "- {}", offering);
        }
        prompt.push_str("Lugares de encuentro (usa solo estos, nunca otra dirección):\n");
        for location in &policy.locations {
            let _ = writeln!(prompt, "- {}", location);
        }
        prompt.push('\n');

        prompt.push_str("Política según la intención:\n");
        prompt.push_str(
            "- NOT_INTERESTED: agradece su tiempo y respeta la decisión. Puedes intentar \
             como máximo una vez, con suavidad, despertar su interés; si insiste, confirma \
             que no se insistirá más.\n",
        );
        prompt.push_str(
            "- FOLLOW_UP: agradece y ofrece retomar la conversación en otro momento, sin presionar.\n",
        );
        let _ = writeln!(
            prompt,
            "- INTERESTED: recomienda una o máximo {} de las ofertas disponibles y propone \
             agendar una cita (día y hora) en uno de los lugares de encuentro.",
            MAX_OFFERINGS_PER_REPLY
        );
        prompt.push_str(
            "- NEUTRAL: haz una pregunta sencilla para aclarar qué necesita el cliente.\n",
        );
        prompt.push('\n');

        prompt.push_str("Reglas:\n");
        prompt.push_str("- Nunca pidas la dirección física ni el lugar de residencia del cliente.\n");
        prompt.push_str("- No inventes precios, ofertas ni lugares distintos a los indicados.\n");
        prompt.push_str("- Mantén coherencia con la conversación reciente.\n");

        if !history.is_empty() {
            prompt.push_str("\nConversación reciente:\n");
            for turn in history {
                let user = if turn.user_text.trim().is_empty() {
                    "(no se escuchó respuesta)"
                } else {
                    turn.user_text.as_str()
                };
                let _ = writeln!(prompt, "Cliente: {}", user);
                let _ = writeln!(prompt, "Agente: {}", turn.agent_text);
            }
        }

        prompt.push('\n');
        let _ = writeln!(prompt, "Texto exacto que dijo el usuario: \"{}\"", user_text);
        let _ = writeln!(prompt, "Intención detectada: {}", intent);
        prompt.push('\n');
        prompt.push_str("Genera la respuesta final que se dirá al usuario ahora.");

        prompt
    }
}

impl std::fmt::Debug for ReplyGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyGenerator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
