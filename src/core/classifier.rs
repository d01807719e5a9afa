//! Category classification from merchant category text and product names.
//!
//! Two ordered rule tables are consulted. The first looks only at the
//! merchant's category text; the second looks at category text plus item name
//! using product vocabulary (brands, models, formats). Within a table the first
//! matching rule wins, so narrower categories (media, baby, beauty) sit above
//! broad ones such as electronics. No match means the record is dropped.

use crate::domain::model::Category;
use once_cell::sync::Lazy;
use regex::Regex;

type Rule = (Category, Regex);

fn build(rules: &[(Category, &str)]) -> Vec<Rule> {
    rules
        .iter()
        .map(|(category, pattern)| {
            let regex = Regex::new(&format!(r"(?i)\b(?:{})\b", pattern))
                .unwrap_or_else(|e| panic!("invalid pattern for {}: {}", category, e));
            (*category, regex)
        })
        .collect()
}

static CATEGORY_TEXT_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    build(&[
        (
            Category::Music,
            r"m[úu]sica|music|vinilos?|vinyls?|discos?|cds?|instrumentos? musicales|musical instruments?",
        ),
        (
            Category::Books,
            r"libros?|books?|literatura|novelas?|c[óo]mics?|ebooks?|revistas?|magazines?",
        ),
        (
            Category::Movies,
            r"pel[íi]culas?|cine|movies?|films?|dvds?|blu-?ray|series de tv|tv series",
        ),
        (
            Category::BabyKids,
            r"beb[ée]s?|baby|babies|infantil|niños?|niñas?|kids?|juguetes?|juguetería|toys?|puericultura|maternidad",
        ),
        (
            Category::CollectiblesArt,
            r"coleccionismo|coleccionables?|collectibles?|arte|art|antigüedades|antiques?|numismática|filatelia|cuadros?|paintings?",
        ),
        (
            Category::BeautyPersonalCare,
            r"belleza|beauty|cosm[ée]tica|cosmetics?|perfumer[íi]a|perfumes?|fragrances?|cuidado personal|personal care|maquillaje|make-?up|higiene",
        ),
        (
            Category::MotorAccessories,
            r"accesorios (?:para |de )?(?:coches?|motos?|autom[óo]vil(?:es)?)|recambios|repuestos|neum[áa]ticos|tyres?|tires|car accessories|auto parts|motor accessories",
        ),
        (
            Category::CarsMotorcycles,
            r"coches?|motos?|motocicletas?|veh[íi]culos?|autom[óo]viles|cars?|motorcycles?|vehicles?",
        ),
        (
            Category::RealEstate,
            r"inmobiliaria|inmuebles?|viviendas?|real estate|property|properties|apartments?",
        ),
        (
            Category::TravelExperiences,
            r"viajes?|travel|vacaciones|holidays?|hoteles?|hotels?|experiencias|experiences?|vuelos?|flights?|escapadas",
        ),
        (
            Category::Services,
            r"servicios?|services?|seguros?|insurance|formaci[óo]n|cursos?|courses?|suscripci[óo]n(?:es)?|subscriptions?",
        ),
        (
            Category::AgricultureIndustrial,
            r"agricultura|agr[íi]cola|agriculture|industrial|industria|maquinaria|machinery|ganader[íi]a",
        ),
        (
            Category::Diy,
            r"bricolaje|diy|herramientas?|tools?|ferreter[íi]a|construcci[óo]n",
        ),
        (
            Category::SportsLeisure,
            r"deportes?|deportivos?|sports?|fitness|outdoor|ocio|leisure|camping|ciclismo|cycling|running|golf|pesca|fishing",
        ),
        (
            Category::HomeGarden,
            r"hogar|casa|home|jard[íi]n|garden|muebles?|furniture|decoraci[óo]n|decor|cocina|kitchen|electrodom[ée]sticos|ba[ñn]o|bathroom",
        ),
        (
            Category::Fashion,
            r"moda|fashion|ropa|clothing|apparel|calzado|zapatos?|shoes?|zapatillas|sneakers|bolsos?|bags?|joyer[íi]a|jewell?ery|relojes?|watches",
        ),
        (
            Category::TechElectronics,
            r"electr[óo]nica|electronics?|inform[áa]tica|computers?|computing|ordenadores?|port[áa]tiles|laptops?|tecnolog[íi]a|technology|tech|telefon[íi]a|m[óo]viles|smartphones?|mobile phones?|tablets?|televisores?|tvs?|audio|v[íi]deo|consolas?|videojuegos|video ?games|gaming|c[áa]maras?|cameras?|fotograf[íi]a|photography|wearables?",
        ),
        (
            Category::Others,
            r"otros|otras|others?|varios|miscellaneous|misc",
        ),
    ])
});

static PRODUCT_NAME_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    build(&[
        (Category::Movies, r"blu-?ray|dvd|4k uhd|steelbook"),
        (
            Category::Books,
            r"tapa blanda|tapa dura|paperback|hardcover|novela|isbn|edici[óo]n de bolsillo",
        ),
        (
            Category::Music,
            r"vinilo|vinyl|lp|guitarra|guitar|piano|ukelele|sinfon[íi]a|symphony|sonata|concierto",
        ),
        (
            Category::BabyKids,
            r"lego|playmobil|peluche|pañal(?:es)?|diapers?|cochecito|carrito de beb[ée]|biber[óo]n|chupete",
        ),
        (
            Category::BeautyPersonalCare,
            r"perfume|eau de (?:parfum|toilette)|colonia|crema facial|s[ée]rum|champ[úu]|shampoo|maquillaje|pintalabios|lipstick|afeitadora|shaver|secador",
        ),
        (
            Category::MotorAccessories,
            r"neum[áa]ticos?|tyres?|casco de moto|motorcycle helmet|aceite de motor|escobillas|dashcam",
        ),
        (
            Category::Fashion,
            r"camisetas?|t-shirts?|vestidos?|dress|pantal[óo]n(?:es)?|jeans|vaqueros|chaquetas?|jackets?|abrigos?|coats?|sudaderas?|hoodies?|zapatillas|sneakers|botas|boots|bolsos?|handbags?|gafas de sol|sunglasses",
        ),
        (
            Category::SportsLeisure,
            r"bicicletas?|bikes?|raquetas?|rackets?|mancuernas|dumbbells?|esterilla|yoga mat|bal[óo]n|tienda de campaña|tents?|patinete",
        ),
        (
            Category::Diy,
            r"taladro|drill|destornillador|screwdriver|sierra|lijadora|sander|llave inglesa|wrench|caja de herramientas",
        ),
        (
            Category::HomeGarden,
            r"sof[áa]|colch[óo]n|mattress|l[áa]mpara|lamp|sart[ée]n|frying pan|aspiradora|vacuum|cafetera|coffee maker|cortac[ée]sped|lawn ?mower|barbacoa|bbq|almohada|pillow",
        ),
        (
            Category::TechElectronics,
            r"iphone|ipad|macbook|imac|airpods|galaxy|xiaomi|huawei|pixel|smartphone|m[óo]vil|port[áa]til|laptop|tablet|televisor|smart tv|oled|qled|playstation|ps5|xbox|nintendo|auriculares|headphones|earbuds|altavoz|speaker|monitor|ssd|router|kindle|gopro|smartwatch|apple watch",
        ),
    ])
});

fn first_match(rules: &[Rule], text: &str) -> Option<Category> {
    rules
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map(|(category, _)| *category)
}

/// Maps merchant category text and an item name to a canonical category.
///
/// `None` means "drop the record", never "others".
pub fn classify(raw_category: &str, item_name: &str) -> Option<Category> {
    let raw_category = raw_category.trim();
    let item_name = item_name.trim();

    if !raw_category.is_empty() {
        if let Some(category) = first_match(&CATEGORY_TEXT_RULES, raw_category) {
            return Some(category);
        }
    }

    let combined = format!("{} {}", raw_category, item_name);
    if combined.trim().is_empty() {
        return None;
    }
    first_match(&PRODUCT_NAME_RULES, &combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_tables_compile() {
        assert_eq!(CATEGORY_TEXT_RULES.len(), 18);
        assert!(!PRODUCT_NAME_RULES.is_empty());
    }

    #[test]
    fn test_music_category_text() {
        assert_eq!(
            classify("Música > Clásica", "Rachmaninov: Sinfonía n.2"),
            Some(Category::Music)
        );
        assert_eq!(
            classify("MÚSICA > Jazz", "Kind of Blue"),
            Some(Category::Music)
        );
    }

    #[test]
    fn test_empty_input_is_unclassified() {
        assert_eq!(classify("", ""), None);
        assert_eq!(classify("   ", "  "), None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let first = classify("Electrónica > Telefonía", "Samsung Galaxy S23");
        for _ in 0..20 {
            assert_eq!(classify("Electrónica > Telefonía", "Samsung Galaxy S23"), first);
        }
        assert_eq!(first, Some(Category::TechElectronics));
    }

    #[test]
    fn test_media_checked_before_electronics() {
        // Media sold through electronics-adjacent trees must stay media.
        assert_eq!(
            classify("Cine y TV > Películas Blu-ray", "Oppenheimer"),
            Some(Category::Movies)
        );
        assert_eq!(
            classify("Libros > Informática", "Programming Rust"),
            Some(Category::Books)
        );
        assert_eq!(
            classify("Música > Vinilos", "Abbey Road"),
            Some(Category::Music)
        );
    }

    #[test]
    fn test_motor_accessories_before_cars() {
        assert_eq!(
            classify("Accesorios para coches > Alfombrillas", "Alfombrillas universales"),
            Some(Category::MotorAccessories)
        );
        assert_eq!(
            classify("Motos > Scooters", "Vespa Primavera"),
            Some(Category::CarsMotorcycles)
        );
    }

    #[test]
    fn test_product_name_fallback() {
        assert_eq!(classify("", "Rachmaninov: Sinfonía n.2"), Some(Category::Music));
        assert_eq!(
            classify("Ofertas", "Apple iPhone 13 Pro 128GB"),
            Some(Category::TechElectronics)
        );
        assert_eq!(
            classify("Novedades", "Zapatillas Nike Air Max"),
            Some(Category::Fashion)
        );
        assert_eq!(
            classify("", "Dune (Blu-ray)"),
            Some(Category::Movies)
        );
    }

    #[test]
    fn test_explicit_others_text() {
        assert_eq!(classify("Otros", "Cosa rara"), Some(Category::Others));
    }

    #[test]
    fn test_unknown_vocabulary_is_dropped() {
        assert_eq!(classify("Ofertas", "Artículo sorpresa"), None);
    }
}
