use crate::models::*;
use chrono::{Duration, TimeZone, Utc};

fn city(id: &str, en: &str, ar: &str, ku: &str) -> City {
    City {
        id: id.to_string(),
        name: LocalizedText::new(en, ar, ku),
        image: format!("https://picsum.photos/seed/{id}/800/600"),
    }
}

fn category(id: &str, en: &str, ar: &str, ku: &str) -> Category {
    Category {
        id: id.to_string(),
        name: LocalizedText::new(en, ar, ku),
        image: format!("https://picsum.photos/seed/category-{id}/400/300"),
    }
}

pub fn cities() -> Vec<City> {
    vec![
        city("erbil", "Erbil", "أربيل", "هەولێر"),
        city("sulaymaniyah", "Sulaymaniyah", "السليمانية", "سلێمانی"),
        city("duhok", "Duhok", "دهوك", "دهۆک"),
        city("halabja", "Halabja", "حلبجة", "هەڵەبجە"),
        city("zakho", "Zakho", "زاخو", "زاخۆ"),
        city("kirkuk", "Kirkuk", "كركوك", "کەرکووک"),
    ]
}

pub fn categories() -> Vec<Category> {
    vec![
        category(ALL_CATEGORY_ID, "All", "الكل", "هەموو"),
        category("music", "Music", "موسيقى", "مۆسیقا"),
        category("arts", "Arts & Culture", "فنون وثقافة", "هونەر و کلتوور"),
        category("sports", "Sports", "رياضة", "وەرزش"),
        category("food", "Food & Drink", "طعام وشراب", "خواردن و خواردنەوە"),
        category("tech", "Technology", "تكنولوجيا", "تەکنەلۆژیا"),
        category("community", "Community", "مجتمع", "کۆمەڵگا"),
    ]
}

pub fn users() -> Vec<User> {
    vec![
        User {
            id: "user-1".to_string(),
            name: "Dara Aziz".to_string(),
            avatar_url: "https://i.pravatar.cc/150?u=dara@example.com".to_string(),
            phone: "+964 750 123 4567".to_string(),
            email: "dara@example.com".to_string(),
            password: Some("password123".to_string()),
            is_verified: true,
        },
        User {
            id: "user-2".to_string(),
            name: "Shilan Omar".to_string(),
            avatar_url: "https://i.pravatar.cc/150?u=shilan@example.com".to_string(),
            phone: "+964 770 987 6543".to_string(),
            email: "shilan@example.com".to_string(),
            password: Some("password123".to_string()),
            is_verified: true,
        },
        User {
            id: "user-3".to_string(),
            name: "Karwan Ali".to_string(),
            avatar_url: "https://i.pravatar.cc/150?u=karwan@example.com".to_string(),
            phone: "+964 751 555 0101".to_string(),
            email: "karwan@example.com".to_string(),
            password: Some("password123".to_string()),
            is_verified: false,
        },
    ]
}

pub fn events() -> Vec<Event> {
    let base = Utc
        .with_ymd_and_hms(2026, 11, 1, 18, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let reviewer = users()[1].public();

    vec![
        Event {
            id: "event-1".to_string(),
            title: LocalizedText::new(
                "Citadel Music Night",
                "ليلة الموسيقى في القلعة",
                "شەوی مۆسیقا لە قەڵا",
            ),
            description: LocalizedText::new(
                "An evening of traditional and modern Kurdish music beneath the Erbil Citadel.",
                "أمسية من الموسيقى الكردية التقليدية والحديثة تحت قلعة أربيل.",
                "ئێوارەیەک لە مۆسیقای کوردی کلاسیک و نوێ لە ژێر قەڵای هەولێر.",
            ),
            organizer_id: "user-1".to_string(),
            organizer_name: "Dara Aziz".to_string(),
            category_id: "music".to_string(),
            city_id: "erbil".to_string(),
            date: base + Duration::days(7),
            venue: "Erbil Citadel Square".to_string(),
            coordinates: Some(Coordinates { lat: 36.1912, lon: 44.0092 }),
            organizer_phone: "+964 750 123 4567".to_string(),
            whatsapp_number: Some("+9647501234567".to_string()),
            image_url: "https://picsum.photos/seed/citadel-music/1200/675".to_string(),
            ticket_info: Some("Free entry".to_string()),
            reviews: vec![Review {
                id: "review-1".to_string(),
                user: reviewer,
                rating: 5,
                comment: "Unforgettable atmosphere.".to_string(),
                timestamp: base - Duration::days(30),
            }],
            is_featured: true,
            is_top: true,
        },
        Event {
            id: "event-2".to_string(),
            title: LocalizedText::new(
                "Goizha Mountain Trail Run",
                "سباق جبل كويژه",
                "ڕاکردنی چیای گۆیژە",
            ),
            description: LocalizedText::new(
                "A 12 km trail run with views over Sulaymaniyah.",
                "سباق جري لمسافة 12 كم مع إطلالة على السليمانية.",
                "ڕاکردنێکی ١٢ کیلۆمەتری بە دیمەنی سلێمانی.",
            ),
            organizer_id: "user-2".to_string(),
            organizer_name: "Shilan Omar".to_string(),
            category_id: "sports".to_string(),
            city_id: "sulaymaniyah".to_string(),
            date: base + Duration::days(14),
            venue: "Goizha Trailhead".to_string(),
            coordinates: Some(Coordinates { lat: 35.5862, lon: 45.4564 }),
            organizer_phone: "+964 770 987 6543".to_string(),
            whatsapp_number: None,
            image_url: "https://picsum.photos/seed/goizha-run/1200/675".to_string(),
            ticket_info: Some("Registration 15,000 IQD".to_string()),
            reviews: Vec::new(),
            is_featured: true,
            is_top: false,
        },
        Event {
            id: "event-3".to_string(),
            title: LocalizedText::new(
                "Duhok Street Food Festival",
                "مهرجان طعام الشارع في دهوك",
                "فێستیڤاڵی خواردنی شەقام لە دهۆک",
            ),
            description: LocalizedText::new(
                "Local vendors, live cooking and family games by the Duhok dam.",
                "بائعون محليون وطبخ مباشر وألعاب عائلية قرب سد دهوك.",
                "فرۆشیارانی ناوخۆ، چێشتلێنانی ڕاستەوخۆ و یاری خێزانی لە نزیک بەنداوی دهۆک.",
            ),
            organizer_id: "user-1".to_string(),
            organizer_name: "Dara Aziz".to_string(),
            category_id: "food".to_string(),
            city_id: "duhok".to_string(),
            date: base + Duration::days(3),
            venue: "Duhok Dam Park".to_string(),
            coordinates: None,
            organizer_phone: "+964 750 123 4567".to_string(),
            whatsapp_number: None,
            image_url: "https://picsum.photos/seed/duhok-food/1200/675".to_string(),
            ticket_info: None,
            reviews: Vec::new(),
            is_featured: false,
            is_top: true,
        },
    ]
}
