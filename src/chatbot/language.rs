//! Supported languages and their static UI strings.
//!
//! Piribot talks in Spanish (`es`), Quechua (`qu`) and Shipibo-Konibo (`shp`).
//! The Quechua and Shipibo-Konibo texts are working translations and should be
//! reviewed by native speakers before a wider rollout.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::chatbot::alerts::AlertCategory;
use crate::chatbot::text;

/// A language code outside {es, qu, shp}.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language code '{0}'")]
pub struct UnsupportedLanguage(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LanguageCode {
    Es,
    Qu,
    Shp,
}

impl LanguageCode {
    /// Keyboard order.
    pub const ALL: [LanguageCode; 3] = [LanguageCode::Es, LanguageCode::Qu, LanguageCode::Shp];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::Es => "es",
            LanguageCode::Qu => "qu",
            LanguageCode::Shp => "shp",
        }
    }

    /// The language's name for itself, used on the selection keyboard.
    pub fn label(&self) -> &'static str {
        match self {
            LanguageCode::Es => "Español",
            LanguageCode::Qu => "Runa Simi",
            LanguageCode::Shp => "Shipibo-Konibo",
        }
    }

    /// Name used inside model instructions.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            LanguageCode::Es => "español",
            LanguageCode::Qu => "quechua (runa simi)",
            LanguageCode::Shp => "shipibo-konibo",
        }
    }

    pub fn strings(&self) -> &'static LanguageStrings {
        match self {
            LanguageCode::Es => &ES,
            LanguageCode::Qu => &QU,
            LanguageCode::Shp => &SHP,
        }
    }

    /// Interpret a reply to the language keyboard.
    ///
    /// Accepts the keyboard labels, the codes and a few common names,
    /// ignoring case, accents and surrounding whitespace.
    pub fn from_selection(input: &str) -> Option<Self> {
        let folded = text::fold(input);
        match folded.as_str() {
            "es" | "espanol" | "castellano" | "spanish" => Some(LanguageCode::Es),
            "qu" | "runa simi" | "runasimi" | "quechua" | "qhichwa" => Some(LanguageCode::Qu),
            "shp" | "shipibo-konibo" | "shipibo konibo" | "shipibo" => Some(LanguageCode::Shp),
            _ => None,
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageCode {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "es" => Ok(LanguageCode::Es),
            "qu" => Ok(LanguageCode::Qu),
            "shp" => Ok(LanguageCode::Shp),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Look up the strings for a raw language code.
pub fn get_strings(code: &str) -> Result<&'static LanguageStrings, UnsupportedLanguage> {
    code.parse::<LanguageCode>().map(|lang| lang.strings())
}

/// Localized warning line per alert category.
pub struct WarningTexts {
    pub seizures: &'static str,
    pub bleeding: &'static str,
    pub fluid_loss: &'static str,
    pub reduced_fetal_movement: &'static str,
    pub breathing_difficulty: &'static str,
    pub fainting: &'static str,
    pub severe_pain: &'static str,
    pub severe_headache: &'static str,
    pub fever: &'static str,
}

pub struct LanguageStrings {
    pub welcome: &'static str,
    pub choose_language: &'static str,
    pub language_set: &'static str,
    pub help: &'static str,
    pub disclaimer: &'static str,
    pub alert_prefix: &'static str,
    pub alert_suffix: &'static str,
    pub fallback_error: &'static str,
    /// Stand-in user text for a photo sent without caption.
    pub image_caption: &'static str,
    pub warnings: WarningTexts,
}

impl LanguageStrings {
    pub fn warning(&self, category: AlertCategory) -> &'static str {
        let w = &self.warnings;
        match category {
            AlertCategory::Seizures => w.seizures,
            AlertCategory::Bleeding => w.bleeding,
            AlertCategory::FluidLoss => w.fluid_loss,
            AlertCategory::ReducedFetalMovement => w.reduced_fetal_movement,
            AlertCategory::BreathingDifficulty => w.breathing_difficulty,
            AlertCategory::Fainting => w.fainting,
            AlertCategory::SeverePain => w.severe_pain,
            AlertCategory::SevereHeadache => w.severe_headache,
            AlertCategory::Fever => w.fever,
        }
    }
}

static ES: LanguageStrings = LanguageStrings {
    welcome: "👋 Hola, soy Piribot.\n\
        Estoy aquí para acompañarte durante tu embarazo con información general y apoyo emocional.",
    choose_language: "Por favor, elige el idioma en el que prefieres conversar:",
    language_set: "Perfecto, conversaremos en español 🇵🇪.",
    help: "Puedes escribirme tus dudas o cómo te sientes durante el embarazo y te responderé \
        con información sencilla y acompañamiento emocional. También puedes enviarme la foto \
        de un resultado de examen para una explicación general.\n\n\
        Ejemplos de preguntas:\n\
        - ¿Es normal sentir náuseas en el primer trimestre?\n\
        - ¿Qué puedo hacer para dormir mejor?\n\
        - Me siento preocupada, ¿puedo contarte cómo me siento?\n\n\
        Comandos:\n\
        /start - empezar de nuevo\n\
        /language - cambiar de idioma\n\
        /help - ver esta ayuda",
    disclaimer: "⚠️ Importante\n\
        Piribot no reemplaza a una profesional ni a un profesional de salud. \
        Solo brinda información general y acompañamiento emocional. \
        Si tienes una urgencia, dolor muy fuerte, sangrado, fiebre o te sientes muy mal, \
        acude de inmediato al centro de salud u hospital más cercano.",
    alert_prefix: "🚨 Lo que cuentas podría ser una señal de alarma durante el embarazo:",
    alert_suffix: "Te recomiendo que acudas lo antes posible a un centro de salud u hospital \
        y, si es necesario, llames a los servicios de emergencia de tu zona. \
        Mientras tanto, trata de no quedarte sola y busca apoyo de alguna persona de confianza.",
    fallback_error: "Lo siento, en este momento no puedo responder con normalidad. \
        Por favor, intenta nuevamente más tarde. \
        Si tienes una urgencia, acude al centro de salud u hospital más cercano.",
    image_caption: "He enviado una imagen relacionada con un examen o evaluación médica \
        durante el embarazo. Quisiera una orientación general, sin diagnóstico.",
    warnings: WarningTexts {
        seizures: "• Convulsiones o ataques: necesitan atención de emergencia inmediata.",
        bleeding: "• Sangrado vaginal: cualquier sangrado en el embarazo debe ser revisado por personal de salud.",
        fluid_loss: "• Pérdida de líquido: puede indicar que la bolsa se rompió.",
        reduced_fetal_movement: "• El bebé se mueve menos o no se mueve: debe evaluarse el mismo día.",
        breathing_difficulty: "• Dificultad para respirar: requiere atención inmediata.",
        fainting: "• Desmayos o mareos fuertes: no esperes a que pase solo.",
        severe_pain: "• Dolor muy fuerte en el vientre: puede ser una señal de alarma.",
        severe_headache: "• Dolor de cabeza fuerte o visión borrosa: puede relacionarse con la presión alta.",
        fever: "• Fiebre: en el embarazo conviene que te revisen pronto.",
    },
};

static QU: LanguageStrings = LanguageStrings {
    welcome: "👋 Napaykullayki, Piribot kani.\n\
        Wiksayoq kasqayki pachapi willakuykunawan, sonqo yanapakuywan ima qanwan kasaq.",
    choose_language: "Ama hina kaspa, ima simipi rimanakuyta munasqaykita akllay:",
    language_set: "Allinmi, Runa Simipi rimanakusun 🇵🇪.",
    help: "Wiksayoq kasqaykimanta tapukuykunata, imayna kashasqaykita ima qillqamuway. \
        Pisi simikunawan, sonqowan kutichisqayki. Examen rikch'ayta apachimuwaqtaqmi.\n\n\
        Tapukuykuna:\n\
        - Qallariy killakunapi aqtuy munayqa normalchu?\n\
        - Imaynatataq aswan allinta puñuyman?\n\
        - Llakisqa kashani, willasqaykichu?\n\n\
        /start - wakmanta qallariy\n\
        /language - simita tikray\n\
        /help - kay yanapayta qhaway",
    disclaimer: "⚠️ Yuyariy\n\
        Piribot manam hampikamayoqpa rantinchu. Willakuykunata, sonqo yanapakuyta ima qun. \
        Yawar lloqsimuqtin, sinchi nanaypi, q'oñi unquypi utaq mana allin kaspaqa, \
        kunallan aswan qayllapi kaq hampina wasiman riy.",
    alert_prefix: "🚨 Willasqaykiqa wiksayoq kaypi huk peligro rikuchikuy kanman:",
    alert_suffix: "Kunallan aswan qayllapi kaq hampina wasiman riy. \
        Ama sapallayki kaychu, huk riqsisqa runata yanapakuyta mañakuy.",
    fallback_error: "Pampachaway, kunan pacha manam allinta kutichiyta atinichu. \
        Qhipaman wakmanta qillqamuway. \
        Peligro kaqtinqa, kunallan hampina wasiman riy.",
    image_caption: "Huk examen medico rikch'ayta apachimuyki. \
        Willakuyta munani, mana diagnósticowan.",
    warnings: WarningTexts {
        seizures: "• Convulsiones (wañuy-wañuy): kunallan hampina wasiman.",
        bleeding: "• Yawar lloqsimuy: wiksayoq kaspa yawar lloqsimuyqa hampina wasipi qhawachikunan.",
        fluid_loss: "• Yaku lloqsimuy: wawaq bolsan p'akikunman.",
        reduced_fetal_movement: "• Wawa mana kuyurinchu: kunan p'unchaylla qhawachikuy.",
        breathing_difficulty: "• Samayta mana atiy: kunallan yanapakuyta maskay.",
        fainting: "• Sunqu tukuy, umayuyay chinkay: ama suyaychu.",
        severe_pain: "• Sinchi wiksa nanay: peligro rikuchikuy kanman.",
        severe_headache: "• Sinchi uma nanay, ñawi tutayay: presión alta kanman.",
        fever: "• Q'oñi unquy (fiebre): utqaylla qhawachikuy.",
    },
};

static SHP: LanguageStrings = LanguageStrings {
    welcome: "👋 Jakon nete, Piribot iki en.\n\
        Mia bake biai ikax, mia información jakon yoiai, mia shinan ja atiresi.",
    choose_language: "Jenki, jawe joi meran yoyo iti mia kopiai, akën:",
    language_set: "Jakon, Shipibo-Konibo joi meran yoyo iti noa 🇵🇪.",
    help: "Mia bake biai ikax jawekibo mia yokaxon, mia shinan yoiyon, \
        en mia jakon joi betan kopíai. Examen foto mia raanti atipanke.\n\n\
        /start - jatibi ribi peoti\n\
        /language - joi bichinti\n\
        /help - ja yonotiki onanti",
    disclaimer: "⚠️ Onanwe\n\
        Piribot médico itama, enfermera itama. Información jakon riki. \
        Jimi pikotaxon, itsa isinaxon, yona iikaxon jawe mia jakonmaxon, \
        jatiribi centro de salud rabi o hospital rabi kanwe.",
    alert_prefix: "🚨 Mia yoiai jawekiaxa bake biai ikax peligro iti atipanke:",
    alert_suffix: "Jatiribi centro de salud rabi o hospital rabi kanwe. \
        Mia westiora ikanwe, mia familia betan ikanwe.",
    fallback_error: "Akin, enra jakon kopíti atima ikai. \
        Chamanbi ribi yokawe. \
        Peligro ikaxon, jatiribi centro de salud rabi kanwe.",
    image_caption: "En examen médico foto raanai. \
        Información jakon en kopiai, diagnóstico itama.",
    warnings: WarningTexts {
        seizures: "• Convulsiones: jatiribi hospital rabi kanwe.",
        bleeding: "• Jimi pikoti (sangrado): bake biai ikax centro de salud rabi onanti.",
        fluid_loss: "• Jene pikoti: bake bolsa tosaketi atipanke.",
        reduced_fetal_movement: "• Bake nikama: enra nete meran onanwe.",
        breathing_difficulty: "• Jana bitima: jatiribi kanwe.",
        fainting: "• Mia mawaxon, mia nishi iikaxon: manamawe.",
        severe_pain: "• Poko itsa isin: peligro iti atipanke.",
        severe_headache: "• Mapo itsa isin, bero yamekaxon: presión alta iti atipanke.",
        fever: "• Yona (fiebre): chamanbi onanwe.",
    },
};
