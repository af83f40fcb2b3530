//! Prompt composition for the generation service.
//!
//! Instructions are written in Spanish, the working language of the
//! deployment; the language block tells the model which language to answer in.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::chatbot::alerts::AlertMatch;
use crate::chatbot::faq::FaqIndex;
use crate::chatbot::language::LanguageCode;
use crate::chatbot::message::ImagePayload;
use crate::chatbot::text;

const BASE_INSTRUCTION: &str = "\
Eres Piribot, un chatbot de acompañamiento para mujeres embarazadas en Perú.
Tu tarea es brindar:
- Información general sobre el embarazo.
- Acompañamiento emocional y contención.
- Orientaciones generales sobre autocuidado y cuándo acudir a un servicio de salud.

Reglas éticas y de seguridad (OBLIGATORIAS):
1. NUNCA des diagnósticos médicos.
2. NUNCA indiques tratamientos médicos concretos, dosis de medicamentos ni esquemas de medicación.
3. NUNCA pidas ni guardes datos personales (nombre completo, DNI, dirección, teléfono, etc.).
4. Si la pregunta es muy específica sobre una enfermedad, un medicamento o un tratamiento, responde de forma general y aclara que debe consultarlo con una profesional o un profesional de salud.
5. Si la persona expresa mucha duda, miedo o inseguridad sobre su salud o la de su bebé, recomienda con amabilidad acudir a una atención presencial en su centro de salud.
6. Si la situación podría ser urgente (sangrado, dolor muy fuerte, fiebre, pérdida de líquido, convulsiones, no sentir los movimientos del bebé, dificultad para respirar, desmayo, etc.), recomienda con claridad acudir de inmediato a un centro de salud u hospital.
7. Usa siempre un tono respetuoso, cálido, empático, intercultural y no técnico.
8. Evita tecnicismos. Explica con palabras sencillas, frases cortas y párrafos breves.
9. Nunca prometas curación ni des garantías de resultados.
10. Si la conversación se aleja del embarazo, la salud materna, el bebé o el bienestar emocional relacionado, explica amablemente que solo puedes acompañar en esos temas.
11. No agregues un aviso legal al final: Piribot añade su propio recordatorio automáticamente.

Formato de respuesta:
- Párrafos cortos, lenguaje sencillo, cercano y empático.
- Puedes usar viñetas simples cuando ayuden a organizar la información.
- Responde en no más de 3 párrafos cortos (alrededor de 150 a 200 palabras como máximo).
- No comiences cada respuesta con saludos; saluda solo si la persona también saluda.";

const IMAGE_INSTRUCTION: &str = "\
Resultados de exámenes:
La persona comparte un resultado de examen. Tu comentario se limita a:
- Nombrar de forma general qué tipo de examen es.
- Explicar en palabras sencillas qué suele medir.
- SOLO si el propio resultado muestra rangos de referencia explícitos, decir si un valor está dentro o fuera de ese rango (por ejemplo: \"este valor está dentro del rango de referencia que muestra tu examen\").
Está PROHIBIDO decir que la persona está sana o enferma, o nombrar una enfermedad como conclusión (por ejemplo \"tienes anemia\").
Aclara siempre que el resultado debe revisarlo una profesional o un profesional de salud.";

/// An image sent with the current message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageContext {
    /// `None` when the image could not be downloaded.
    pub payload: Option<ImagePayload>,
}

/// Everything sent to the generator for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub language: LanguageCode,
    pub system_instruction: String,
    pub user_turn: String,
    pub image: Option<ImagePayload>,
}

/// A reference range and a value the user typed next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReading {
    pub low: String,
    pub high: String,
    pub value: String,
    pub within: bool,
}

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:rango|referencia|valores? normales?|normal)\D{0,20}?(\d+(?:[.,]\d+)?)\s*(?:-|–|a|al|hasta)\s*(\d+(?:[.,]\d+)?)",
    )
    .expect("range regex is valid")
});

static VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:mi valor|el valor|valor|me salio|salio|me dio)\s*(?:es|fue|de|:|=)?\s*(?:de\s+)?(\d+(?:[.,]\d+)?)")
        .expect("value regex is valid")
});

fn parse_number(s: &str) -> Option<f64> {
    s.replace(',', ".").parse().ok()
}

/// Heuristic: find "rango A-B" and "valor V" in free text.
///
/// Not a reliable extractor; anything it cannot read is simply ignored.
pub fn read_range(user_text: &str) -> Option<RangeReading> {
    let folded = text::fold(user_text);
    let range = RANGE_RE.captures(&folded)?;
    let (low_s, high_s) = (range.get(1)?.as_str(), range.get(2)?.as_str());

    let after_range = range.get(0)?.end();
    let value_caps = VALUE_RE
        .captures_at(&folded, after_range)
        .or_else(|| VALUE_RE.captures(&folded))?;
    let value_s = value_caps.get(1)?.as_str();

    let (mut low, mut high) = (parse_number(low_s)?, parse_number(high_s)?);
    if low > high {
        std::mem::swap(&mut low, &mut high);
    }
    let value = parse_number(value_s)?;

    Some(RangeReading {
        low: low_s.to_string(),
        high: high_s.to_string(),
        value: value_s.to_string(),
        within: value >= low && value <= high,
    })
}

fn range_hint(reading: &RangeReading) -> String {
    let verdict = if reading.within {
        "el valor está DENTRO del rango de referencia indicado"
    } else {
        "el valor está FUERA del rango de referencia indicado"
    };
    format!(
        "Dato leído del mensaje: la persona indica un rango de referencia de {} a {} y un valor de {}. \
         Según ese rango, {}. Puedes decirlo así, con calma, sin afirmar que la persona está sana o enferma \
         y recordando que una profesional o un profesional de salud debe revisar el resultado.",
        reading.low, reading.high, reading.value, verdict
    )
}

fn language_block(language: LanguageCode) -> String {
    let name = language.prompt_name();
    let extra = match language {
        LanguageCode::Es => "Usa un español peruano sencillo y trata a la persona de \"tú\".",
        LanguageCode::Qu => {
            "Usa un quechua sencillo y cotidiano. Si no existe una palabra común para un término médico, \
             escribe el término en español entre paréntesis."
        }
        LanguageCode::Shp => {
            "Usa un shipibo-konibo sencillo. Si no existe una palabra común para un término médico, \
             escribe el término en español entre paréntesis."
        }
    };
    format!(
        "Reglas de idioma:\n\
         - Responde SIEMPRE en {name}.\n\
         - Si el mensaje mezcla idiomas, prioriza {name}; puedes incluir palabras de apoyo en otro idioma solo si ayudan a la comprensión.\n\
         - {extra}"
    )
}

fn alert_block(alerts: &AlertMatch) -> String {
    let signs: Vec<&str> = alerts.iter().map(|c| c.prompt_description()).collect();
    format!(
        "Contexto adicional (IMPORTANTE):\n\
         - Se detectaron posibles señales de alarma en el mensaje: {}.\n\
         - Refuerza con claridad y firmeza la recomendación de acudir INMEDIATAMENTE a un centro de salud u hospital, \
         sin generar pánico pero sin minimizar el riesgo.\n\
         - No sugieras esperar ni remedios caseros para estas señales.",
        signs.join(", ")
    )
}

/// Builds [`PromptContext`]s. Pure: identical inputs give identical output.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    faq: FaqIndex,
}

impl PromptBuilder {
    pub fn new(faq: FaqIndex) -> Self {
        Self { faq }
    }

    pub fn build(
        &self,
        language: LanguageCode,
        user_text: &str,
        image: Option<&ImageContext>,
        alerts: &AlertMatch,
    ) -> PromptContext {
        let user_text = user_text.trim();
        let user_text = if user_text.is_empty() && image.is_some() {
            language.strings().image_caption
        } else {
            user_text
        };

        let mut system = String::from(BASE_INSTRUCTION);
        system.push_str("\n\n");
        system.push_str(&language_block(language));

        let reading = read_range(user_text);
        if image.is_some() || reading.is_some() {
            system.push_str("\n\n");
            system.push_str(IMAGE_INSTRUCTION);
            if let Some(ref reading) = reading {
                system.push('\n');
                system.push_str(&range_hint(reading));
            }
        }

        if !alerts.is_empty() {
            system.push_str("\n\n");
            system.push_str(&alert_block(alerts));
        }

        let faq = self.faq.relevant(language, user_text);
        if !faq.is_empty() {
            system.push_str("\n\nEjemplos de respuestas apropiadas:");
            for entry in faq {
                let _ = write!(system, "\n- Pregunta: {}\n  Respuesta: {}", entry.question, entry.answer);
            }
        }

        let mut user_turn = String::new();
        if let Some(image) = image {
            user_turn.push_str("La persona adjuntó una imagen (probablemente un resultado de examen).\n");
            if image.payload.is_none() {
                user_turn.push_str(
                    "La imagen no se pudo leer: responde solo con base en el texto y, si hace falta, \
                     pide que escriba los valores que aparecen en su resultado.\n",
                );
            }
            user_turn.push('\n');
        }
        let _ = write!(
            user_turn,
            "Mensaje de la persona embarazada (idioma: {}):\n\n",
            language.prompt_name()
        );
        if user_text.is_empty() {
            user_turn.push_str(
                "(La persona no escribió ningún texto. Pregúntale con amabilidad en qué la puedes acompañar.)",
            );
        } else {
            user_turn.push_str(user_text);
        }

        PromptContext {
            language,
            system_instruction: system,
            user_turn,
            image: image.and_then(|i| i.payload.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::alerts::AlertCategory;
    use crate::chatbot::faq::FaqEntry;
    use std::collections::HashMap;

    fn builder() -> PromptBuilder {
        let faq = FaqIndex::new(HashMap::from([(
            LanguageCode::Es,
            vec![FaqEntry::new(
                &["náuseas"],
                "¿Es normal tener náuseas?",
                "Es frecuente en el primer trimestre.",
            )],
        )]));
        PromptBuilder::new(faq)
    }

    fn jpeg() -> ImageContext {
        ImageContext {
            payload: Some(ImagePayload {
                data: vec![0xff, 0xd8, 0xff],
                mime_type: "image/jpeg".into(),
            }),
        }
    }

    #[test]
    fn test_base_rules_and_language() {
        let p = builder().build(LanguageCode::Qu, "imaynalla", None, &AlertMatch::default());
        assert!(p.system_instruction.contains("NUNCA des diagnósticos"));
        assert!(p.system_instruction.contains("dosis"));
        assert!(p.system_instruction.contains("Responde SIEMPRE en quechua"));
        assert!(p.user_turn.ends_with("imaynalla"));
        assert_eq!(p.language, LanguageCode::Qu);
        assert!(p.image.is_none());
    }

    #[test]
    fn test_build_is_deterministic() {
        let b = builder();
        let alerts: AlertMatch = [AlertCategory::Fever, AlertCategory::Bleeding].into_iter().collect();
        let img = jpeg();
        let first = b.build(LanguageCode::Es, "tengo náuseas y fiebre", Some(&img), &alerts);
        let second = b.build(LanguageCode::Es, "tengo náuseas y fiebre", Some(&img), &alerts);
        assert_eq!(first, second);
    }

    #[test]
    fn test_alert_block_only_with_matches() {
        let b = builder();
        let calm = b.build(LanguageCode::Es, "hola", None, &AlertMatch::default());
        assert!(!calm.system_instruction.contains("señales de alarma en el mensaje"));

        let alerts: AlertMatch = [AlertCategory::Bleeding].into_iter().collect();
        let urgent = b.build(LanguageCode::Es, "sangro", None, &alerts);
        assert!(urgent.system_instruction.contains("señales de alarma en el mensaje: sangrado"));
        assert!(urgent.system_instruction.contains("INMEDIATAMENTE"));
    }

    #[test]
    fn test_faq_appended_on_overlap_only() {
        let b = builder();
        let with = b.build(LanguageCode::Es, "tengo náuseas", None, &AlertMatch::default());
        assert!(with.system_instruction.contains("Pregunta: ¿Es normal tener náuseas?"));
        let without = b.build(LanguageCode::Es, "me duele la espalda", None, &AlertMatch::default());
        assert!(!without.system_instruction.contains("Ejemplos de respuestas"));
    }

    #[test]
    fn test_image_rules_only_with_image() {
        let b = builder();
        let text_only = b.build(LanguageCode::Es, "hola", None, &AlertMatch::default());
        assert!(!text_only.system_instruction.contains("Resultados de exámenes"));

        let img = jpeg();
        let with_img = b.build(LanguageCode::Es, "mi examen", Some(&img), &AlertMatch::default());
        assert!(with_img.system_instruction.contains("PROHIBIDO decir que la persona está sana o enferma"));
        assert_eq!(with_img.image, img.payload);
        assert!(with_img.user_turn.starts_with("La persona adjuntó una imagen"));
    }

    #[test]
    fn test_image_without_caption_uses_default_text() {
        let p = builder().build(LanguageCode::Es, "  ", Some(&jpeg()), &AlertMatch::default());
        assert!(p.user_turn.contains(LanguageCode::Es.strings().image_caption));
    }

    #[test]
    fn test_unreadable_image_noted() {
        let img = ImageContext { payload: None };
        let p = builder().build(LanguageCode::Es, "resultado", Some(&img), &AlertMatch::default());
        assert!(p.user_turn.contains("no se pudo leer"));
        assert!(p.image.is_none());
    }

    #[test]
    fn test_empty_text_still_builds() {
        let p = builder().build(LanguageCode::Shp, "", None, &AlertMatch::default());
        assert!(p.user_turn.contains("no escribió ningún texto"));
        assert!(!p.system_instruction.is_empty());
    }

    #[test]
    fn test_hemoglobin_within_range() {
        let caption = "resultado de hemoglobina, rango 12-16, mi valor es 13";
        let p = builder().build(LanguageCode::Es, caption, Some(&jpeg()), &AlertMatch::default());
        assert!(p.system_instruction.contains("rango de referencia de 12 a 16 y un valor de 13"));
        assert!(p.system_instruction.contains("DENTRO del rango"));
        assert!(p.system_instruction.contains("sin afirmar que la persona está sana o enferma"));
    }

    #[test]
    fn test_read_range_outside() {
        let r = read_range("Hemoglobina: valores normales 12 a 16 g/dL. Me salió 10,5").unwrap();
        assert_eq!(r.low, "12");
        assert_eq!(r.high, "16");
        assert_eq!(r.value, "10,5");
        assert!(!r.within);
    }

    #[test]
    fn test_read_range_needs_both_parts() {
        assert!(read_range("mi valor es 13").is_none());
        assert!(read_range("rango 12-16").is_none());
        assert!(read_range("tengo 12 semanas").is_none());
    }
}
