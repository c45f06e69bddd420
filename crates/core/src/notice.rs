//! Darija script for the farmer's spoken order notification. Speech synthesis happens
//! elsewhere; this only builds the text.

use serde::{Deserialize, Serialize};

use crate::domain::order::{OrderedProduct, PendingOrderView};

const UNKNOWN_PRODUCT: &str = "منتج مجهول";
const UNKNOWN_TIME: &str = "في وقت غير معروف";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DarijaNotice {
    pub text: String,
    pub client_name: String,
    pub client_phone: String,
}

impl DarijaNotice {
    pub fn render(order: &PendingOrderView) -> Self {
        let products =
            order.products.iter().map(product_line).collect::<Vec<_>>().join("\n");

        let text = format!(
            "السلام وعليكم سي {farmer}\n\
             عندك {products}\n\
             توصلها ل {client}\n\
             {delivery}\n\
             باش تأكد لنا اتوصلها ضغط على الزر الاخضر وغطلع ليك نمرة لكليان\n\
             أولا ضغط على لحمرا باش ترفض",
            farmer = order.farmer.name,
            client = order.client.name,
            delivery = delivery_phrase(&order.delivery_time),
        );

        Self { text, client_name: order.client.name.clone(), client_phone: order.client.phone.clone() }
    }
}

fn product_line(product: &OrderedProduct) -> String {
    let name = if product.arabic_name.trim().is_empty() {
        UNKNOWN_PRODUCT
    } else {
        product.arabic_name.as_str()
    };
    format!("{} كيلو ديال {name}", product.quantity)
}

fn delivery_phrase(token: &str) -> &'static str {
    match token {
        "tomorrow_morning" => "غدا في الصباح",
        "tomorrow_evening" => "غدا في العشية",
        "today_morning" => "اليوم في الصباح",
        "today_evening" => "اليوم في العشية",
        _ => UNKNOWN_TIME,
    }
}
