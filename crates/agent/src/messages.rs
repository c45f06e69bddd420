//! Localized status texts. These are what the client reads when the template phraser is
//! active, and the facts a generative phraser is asked to rephrase otherwise.

use fellah_core::domain::order::DeliveryWindow;
use fellah_core::language::Language;
use fellah_core::ranking::RankedFarmer;

use crate::session::LineItem;

pub fn ask_for_product(language: Language) -> String {
    match language {
        Language::French => "Quel produit souhaitez-vous commander ?",
        Language::Arabic => "ما هو المنتج الذي تود طلبه؟",
        Language::English => "Please tell me what product you'd like to order.",
    }
    .to_string()
}

pub fn ask_for_another_product(language: Language) -> String {
    match language {
        Language::French => "Quel autre produit souhaitez-vous ajouter ?",
        Language::Arabic => "ما هو المنتج الآخر الذي تريد إضافته؟",
        Language::English => "Which other product would you like to add?",
    }
    .to_string()
}

pub fn ask_for_delivery(language: Language) -> String {
    match language {
        Language::French => {
            "Quand souhaitez-vous être livré ? (aujourd'hui ou demain, matin ou soir)"
        }
        Language::Arabic => "متى تريد التوصيل؟ (اليوم أو غدا، صباحا أو مساء)",
        Language::English => "When would you like delivery? (today or tomorrow, morning or evening)",
    }
    .to_string()
}

pub fn product_not_found(language: Language) -> String {
    match language {
        Language::French => {
            "Je n'ai pas trouvé ce produit dans notre catalogue. Pouvez-vous préciser?"
        }
        Language::Arabic => "لم أجد هذا المنتج في دليلنا. هل يمكنك التوضيح؟",
        Language::English => "I couldn't find this product in our catalog. Could you please specify?",
    }
    .to_string()
}

pub fn out_of_stock(language: Language, product: &str, quantity: u32) -> String {
    match language {
        Language::French => format!(
            "Malheureusement, nous n'avons pas {quantity}kg de {product} en stock. Souhaitez-vous en commander une quantité inférieure ou choisir un autre produit?"
        ),
        Language::Arabic => format!(
            "للأسف، ليس لدينا {quantity} كجم من {product} في المخزون. هل ترغب في طلب كمية أقل أو اختيار منتج آخر؟"
        ),
        Language::English => format!(
            "Unfortunately, we don't have {quantity}kg of {product} in stock. Would you like to order a smaller quantity or choose another product?"
        ),
    }
}

pub fn no_nearby_farmer(language: Language, product: &str, quantity: u32) -> String {
    match language {
        Language::French => format!(
            "Aucun agriculteur proche ne peut fournir {quantity}kg de {product}. Voulez-vous essayer un autre produit?"
        ),
        Language::Arabic => format!(
            "لا يوجد مزارع قريب يمكنه توفير {quantity} كجم من {product}. هل تريد تجربة منتج آخر؟"
        ),
        Language::English => format!(
            "No nearby farmer can provide {quantity}kg of {product}. Would you like to try another product?"
        ),
    }
}

/// Numbered farmer list, one line per option, 1-based.
pub fn farmer_options(language: Language, farmers: &[RankedFarmer]) -> String {
    farmers
        .iter()
        .enumerate()
        .map(|(index, farmer)| {
            let position = index + 1;
            let name = &farmer.name;
            let price = farmer.price;
            let distance = farmer.distance;
            let feedback = farmer.feedback;
            match language {
                Language::French => format!(
                    "{position}. {name} - {price}dh/kg, {distance:.2}km, Note: {feedback}/5"
                ),
                Language::Arabic => format!(
                    "{position}. {name} - {price}درهم/كجم, {distance:.2}كم, تقييم: {feedback}/5"
                ),
                Language::English => format!(
                    "{position}. {name} - {price}dh/kg, {distance:.2}km, Rating: {feedback}/5"
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn quote(language: Language, product: &str, quantity: u32, farmers: &[RankedFarmer]) -> String {
    let options = farmer_options(language, farmers);
    match language {
        Language::French => format!(
            "Voici les agriculteurs disponibles pour {quantity}kg de {product}:\n{options}\nVeuillez choisir un numéro."
        ),
        Language::Arabic => format!(
            "إليك المزارعين المتاحين لـ {quantity} كجم من {product}:\n{options}\nيرجى اختيار رقم."
        ),
        Language::English => format!(
            "Here are the available farmers for {quantity}kg of {product}:\n{options}\nPlease choose a number."
        ),
    }
}

pub fn quantity_added(language: Language, product: &str, quantity: u32) -> String {
    match language {
        Language::French => format!("Quantité de {quantity}kg pour {product} ajoutée."),
        Language::Arabic => format!("تمت إضافة كمية {quantity} كيلوغرام من {product}."),
        Language::English => format!("Added {quantity}kg of {product}."),
    }
}

pub fn quantity_unavailable(language: Language, product: &str) -> String {
    match language {
        Language::French => format!("Quantité non disponible pour {product}."),
        Language::Arabic => format!("الكمية غير متوفرة لـ {product}."),
        Language::English => format!("Quantity not available for {product}."),
    }
}

pub fn choose_farmer(language: Language, farmers: &[RankedFarmer]) -> String {
    if farmers.is_empty() {
        return match language {
            Language::French => {
                "Aucun agriculteur ne peut fournir cette commande pour le moment. Écrivez « annuler » pour recommencer."
            }
            Language::Arabic => "لا يوجد مزارع يمكنه توفير هذا الطلب حاليا. اكتب «إلغاء» للبدء من جديد.",
            Language::English => {
                "No farmer can supply this order right now. Type \"cancel\" to start over."
            }
        }
        .to_string();
    }

    let options = farmer_options(language, farmers);
    match language {
        Language::French => format!("Veuillez choisir un agriculteur:\n{options}"),
        Language::Arabic => format!("يرجى اختيار مزارع:\n{options}"),
        Language::English => format!("Please choose a farmer:\n{options}"),
    }
}

pub fn invalid_selection(language: Language) -> String {
    match language {
        Language::French => "Sélection non valide. Veuillez choisir un numéro.",
        Language::Arabic => "اختيار غير صالح. يرجى اختيار رقم.",
        Language::English => "Invalid selection. Please choose a number.",
    }
    .to_string()
}

pub fn order_summary(
    language: Language,
    items: &[LineItem],
    farmer: &str,
    delivery: DeliveryWindow,
) -> String {
    let products = item_list(language, items);
    match language {
        Language::French => format!(
            "Récapitulatif de commande:\nProduits: {products}\nAgriculteur: {farmer}\nLivraison: {delivery}\nVeuillez confirmer (oui/non)"
        ),
        Language::Arabic => format!(
            "ملخص الطلب:\nالمنتجات: {products}\nالمزارع: {farmer}\nوقت التسليم: {delivery}\nيرجى التأكيد (نعم/لا)"
        ),
        Language::English => format!(
            "Order summary:\nProducts: {products}\nFarmer: {farmer}\nDelivery time: {delivery}\nPlease confirm (yes/no)"
        ),
    }
}

pub fn order_confirmed(language: Language) -> String {
    match language {
        Language::French => {
            "Commande confirmée avec succès! Souhaitez-vous commander autre chose?"
        }
        Language::Arabic => "تم تأكيد الطلب بنجاح! هل ترغب في طلب شيء آخر؟",
        Language::English => {
            "Order confirmed successfully! Would you like to order something else?"
        }
    }
    .to_string()
}

pub fn order_failed(language: Language) -> String {
    match language {
        Language::French => "Erreur lors de l'enregistrement de la commande. Veuillez réessayer.",
        Language::Arabic => "خطأ في حفظ الطلب. يرجى المحاولة مرة أخرى.",
        Language::English => "Error saving the order. Please try again.",
    }
    .to_string()
}

pub fn order_cancelled(language: Language) -> String {
    match language {
        Language::French => "Commande annulée. Que souhaitez-vous faire maintenant?",
        Language::Arabic => "تم إلغاء الطلب. ماذا تريد أن تفعل الآن؟",
        Language::English => "Order canceled. What would you like to do now?",
    }
    .to_string()
}

/// Order-so-far suffix appended after any turn that leaves line items in the session.
pub fn ordered_so_far(language: Language, items: &[LineItem]) -> String {
    let label = match language {
        Language::French => "Produits commandés",
        Language::Arabic => "المنتجات المطلوبة",
        Language::English => "Ordered products",
    };
    format!("\n{label}: {}", item_list(language, items))
}

/// Opening prompt used when there is nothing more specific to say.
pub fn default_prompt(language: Language) -> String {
    match language {
        Language::French => {
            "Bonjour! Comment puis-je vous aider aujourd'hui? Souhaitez-vous commander quelque chose?"
        }
        Language::Arabic => "وعليكم السلام! كيف يمكنني مساعدتك اليوم؟ هل تود أن تطلب شيئًا؟",
        Language::English => "Hello! How can I help you today? Would you like to order something?",
    }
    .to_string()
}

fn item_list(language: Language, items: &[LineItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}: {}kg", item.display_name(language), item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}
