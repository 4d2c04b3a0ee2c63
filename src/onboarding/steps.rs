//! Per-step validation schemas for the onboarding wizard.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::validation::{Rule, Validator};

use super::model::{BusinessType, FieldCheck, OnboardingApplication};

/// Summary message when a step fails validation.
pub const STEP_INVALID: &str = "Please correct the highlighted fields";

const PASSPORT_EXPIRED: &str = "Passport must not be expired";

/// The four wizard steps, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStep {
    Personal = 1,
    Passport = 2,
    Address = 3,
    Business = 4,
}

impl OnboardingStep {
    pub const COUNT: i64 = 4;

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::Personal),
            2 => Some(Self::Passport),
            3 => Some(Self::Address),
            4 => Some(Self::Business),
            _ => None,
        }
    }

    pub fn number(self) -> i64 {
        self as i64
    }

    /// Fields the step's schema requires, in form order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Personal => &["firstName", "lastName", "email", "phone"],
            Self::Passport => &["passportNumber", "passportCountry", "passportExpiryDate"],
            Self::Address => &["streetAddress", "city", "state", "zipCode", "country"],
            Self::Business => &[
                "businessName",
                "businessType",
                "businessDescription",
                "businessIndustry",
                "estimatedRevenue",
            ],
        }
    }

    /// Validate submitted step data. `today` anchors the passport expiry check.
    pub fn validate(
        self,
        data: &Map<String, Value>,
        today: NaiveDate,
    ) -> Result<StepData, StepRejection> {
        let mut v = Validator::new();
        let parsed = match self {
            Self::Personal => validate_personal(&mut v, data),
            Self::Passport => validate_passport(&mut v, data, today),
            Self::Address => validate_address(&mut v, data),
            Self::Business => validate_business(&mut v, data),
        };

        let checks = self.field_checks(&v);
        match (v.finish(STEP_INVALID), parsed) {
            (Ok(()), Some(data)) => Ok(StepData { checks, data }),
            (Ok(()), None) => Err(StepRejection {
                checks,
                error: ValidationError::new(STEP_INVALID, Default::default()),
            }),
            (Err(error), _) => Err(StepRejection { checks, error }),
        }
    }

    fn field_checks(self, v: &Validator) -> Vec<FieldCheck> {
        self.fields()
            .iter()
            .map(|field| {
                let errors = v.errors_for(field);
                FieldCheck {
                    field_name: field.to_string(),
                    is_valid: errors.is_empty(),
                    error_message: (!errors.is_empty()).then(|| errors.join("; ")),
                }
            })
            .collect()
    }

    /// Schema fields still empty on the canonical application row.
    pub fn missing_fields(self, app: &OnboardingApplication) -> Vec<String> {
        let present =
            |value: &Option<String>| value.as_deref().is_some_and(|s| !s.trim().is_empty());
        let slots: Vec<(&str, bool)> = match self {
            Self::Personal => vec![
                ("firstName", present(&app.first_name)),
                ("lastName", present(&app.last_name)),
                ("email", present(&app.email)),
                ("phone", present(&app.phone)),
            ],
            Self::Passport => vec![
                ("passportNumber", present(&app.passport_number)),
                ("passportCountry", present(&app.passport_country)),
                ("passportExpiryDate", app.passport_expiry_date.is_some()),
            ],
            Self::Address => vec![
                ("streetAddress", present(&app.street_address)),
                ("city", present(&app.city)),
                ("state", present(&app.state)),
                ("zipCode", present(&app.zip_code)),
                ("country", present(&app.country)),
            ],
            Self::Business => vec![
                ("businessName", present(&app.business_name)),
                ("businessType", app.business_type.is_some()),
                ("businessDescription", present(&app.business_description)),
                ("businessIndustry", present(&app.business_industry)),
                ("estimatedRevenue", present(&app.estimated_revenue)),
            ],
        };
        slots
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

/// A step submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepData {
    pub checks: Vec<FieldCheck>,
    pub data: StepFields,
}

/// A step submission that failed validation, with the per-field outcomes.
#[derive(Debug, Clone)]
pub struct StepRejection {
    pub checks: Vec<FieldCheck>,
    pub error: ValidationError,
}

/// Typed, validated fields of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepFields {
    Personal {
        first_name: String,
        last_name: String,
        email: String,
        phone: String,
    },
    Passport {
        passport_number: String,
        passport_country: String,
        passport_expiry_date: NaiveDate,
        passport_image_url: Option<String>,
    },
    Address {
        street_address: String,
        city: String,
        state: String,
        zip_code: String,
        country: String,
    },
    Business {
        business_name: String,
        business_type: BusinessType,
        business_description: String,
        business_industry: String,
        estimated_revenue: String,
    },
}

impl StepFields {
    /// Copy the validated fields onto the canonical application.
    pub fn apply(self, app: &mut OnboardingApplication) {
        match self {
            Self::Personal {
                first_name,
                last_name,
                email,
                phone,
            } => {
                app.first_name = Some(first_name);
                app.last_name = Some(last_name);
                app.email = Some(email);
                app.phone = Some(phone);
            }
            Self::Passport {
                passport_number,
                passport_country,
                passport_expiry_date,
                passport_image_url,
            } => {
                app.passport_number = Some(passport_number);
                app.passport_country = Some(passport_country);
                app.passport_expiry_date = Some(passport_expiry_date);
                if passport_image_url.is_some() {
                    app.passport_image_url = passport_image_url;
                }
            }
            Self::Address {
                street_address,
                city,
                state,
                zip_code,
                country,
            } => {
                app.street_address = Some(street_address);
                app.city = Some(city);
                app.state = Some(state);
                app.zip_code = Some(zip_code);
                app.country = Some(country);
            }
            Self::Business {
                business_name,
                business_type,
                business_description,
                business_industry,
                estimated_revenue,
            } => {
                app.business_name = Some(business_name);
                app.business_type = Some(business_type);
                app.business_description = Some(business_description);
                app.business_industry = Some(business_industry);
                app.estimated_revenue = Some(estimated_revenue);
            }
        }
    }
}

fn validate_personal(v: &mut Validator, data: &Map<String, Value>) -> Option<StepFields> {
    let first_name = v.json_text(
        data,
        "firstName",
        &[
            Rule::MinLen(2, "First name must be at least 2 characters"),
            Rule::MaxLen(50, "First name too long"),
        ],
    );
    let last_name = v.json_text(
        data,
        "lastName",
        &[
            Rule::MinLen(2, "Last name must be at least 2 characters"),
            Rule::MaxLen(50, "Last name too long"),
        ],
    );
    let email = v.json_text(data, "email", &[Rule::Email("Please enter a valid email address")]);
    let phone = v.json_text(
        data,
        "phone",
        &[
            Rule::MinLen(10, "Please enter a valid phone number"),
            Rule::Phone("Invalid phone format"),
        ],
    );

    Some(StepFields::Personal {
        first_name: first_name?.to_string(),
        last_name: last_name?.to_string(),
        email: email?.to_string(),
        phone: phone?.to_string(),
    })
}

fn validate_passport(
    v: &mut Validator,
    data: &Map<String, Value>,
    today: NaiveDate,
) -> Option<StepFields> {
    let passport_number = v.json_text(
        data,
        "passportNumber",
        &[
            Rule::MinLen(6, "Passport number must be at least 6 characters"),
            Rule::MaxLen(20, "Passport number too long"),
        ],
    );
    let passport_country = v.json_text(
        data,
        "passportCountry",
        &[Rule::MinLen(2, "Please select a country")],
    );

    let expiry = v
        .json_text(data, "passportExpiryDate", &[])
        .and_then(|raw| match parse_date(raw) {
            Some(date) if date > today => Some(date),
            _ => {
                v.add("passportExpiryDate", PASSPORT_EXPIRED);
                None
            }
        });

    let passport_image_url = v
        .json_optional_text(data, "passportImageUrl", &[])
        .map(str::to_string);

    Some(StepFields::Passport {
        passport_number: passport_number?.to_string(),
        passport_country: passport_country?.to_string(),
        passport_expiry_date: expiry?,
        passport_image_url,
    })
}

fn validate_address(v: &mut Validator, data: &Map<String, Value>) -> Option<StepFields> {
    let street_address = v.json_text(
        data,
        "streetAddress",
        &[Rule::MinLen(5, "Please enter a complete street address")],
    );
    let city = v.json_text(
        data,
        "city",
        &[Rule::MinLen(2, "City name must be at least 2 characters")],
    );
    let state = v.json_text(data, "state", &[Rule::MinLen(2, "Please enter state/province")]);
    let zip_code = v.json_text(
        data,
        "zipCode",
        &[Rule::MinLen(3, "Please enter a valid postal code")],
    );
    let country = v.json_text(data, "country", &[Rule::MinLen(2, "Please select a country")]);

    Some(StepFields::Address {
        street_address: street_address?.to_string(),
        city: city?.to_string(),
        state: state?.to_string(),
        zip_code: zip_code?.to_string(),
        country: country?.to_string(),
    })
}

fn validate_business(v: &mut Validator, data: &Map<String, Value>) -> Option<StepFields> {
    let business_name = v.json_text(
        data,
        "businessName",
        &[
            Rule::MinLen(2, "Business name must be at least 2 characters"),
            Rule::MaxLen(100, "Business name too long"),
        ],
    );

    // Any unrecognised or missing type gets the same single message.
    let business_type = match data.get("businessType").and_then(Value::as_str) {
        Some(raw) => raw.parse::<BusinessType>().ok(),
        None => None,
    };
    if business_type.is_none() {
        v.add("businessType", "Please select a business type");
    }

    let business_description = v.json_text(
        data,
        "businessDescription",
        &[
            Rule::MinLen(
                10,
                "Please provide a detailed business description (at least 10 characters)",
            ),
            Rule::MaxLen(500, "Description too long"),
        ],
    );
    let business_industry = v.json_text(
        data,
        "businessIndustry",
        &[Rule::MinLen(2, "Please select an industry")],
    );
    let estimated_revenue = v.json_text(
        data,
        "estimatedRevenue",
        &[Rule::MinLen(1, "Please select estimated revenue range")],
    );

    Some(StepFields::Business {
        business_name: business_name?.to_string(),
        business_type: business_type?,
        business_description: business_description?.to_string(),
        business_industry: business_industry?.to_string(),
        estimated_revenue: estimated_revenue?.to_string(),
    })
}

/// Accept `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn step_numbers() {
        assert_eq!(OnboardingStep::from_number(2), Some(OnboardingStep::Passport));
        assert_eq!(OnboardingStep::from_number(0), None);
        assert_eq!(OnboardingStep::from_number(5), None);
        assert_eq!(OnboardingStep::Business.number(), 4);
        assert_eq!(OnboardingStep::from_number(OnboardingStep::COUNT), Some(OnboardingStep::Business));
    }

    #[test]
    fn personal_step_accepts_valid_data() {
        let data = obj(json!({
            "firstName": "Ana",
            "lastName": "Silva",
            "email": "ana@example.com",
            "phone": "+5511987654321"
        }));
        let step = OnboardingStep::Personal.validate(&data, today()).unwrap();
        assert!(step.checks.iter().all(|c| c.is_valid));
        assert_eq!(step.checks.len(), 4);
        match step.data {
            StepFields::Personal { email, .. } => assert_eq!(email, "ana@example.com"),
            other => panic!("unexpected step data: {other:?}"),
        }
    }

    #[test]
    fn personal_step_reports_every_field() {
        let data = obj(json!({
            "firstName": "A",
            "email": "not-an-email",
            "phone": "12ab"
        }));
        let rejection = OnboardingStep::Personal.validate(&data, today()).unwrap_err();
        let errors = &rejection.error.errors;
        assert_eq!(errors["firstName"], vec!["First name must be at least 2 characters"]);
        assert_eq!(errors["lastName"], vec!["Required"]);
        assert_eq!(errors["email"], vec!["Please enter a valid email address"]);
        assert_eq!(
            errors["phone"],
            vec!["Please enter a valid phone number", "Invalid phone format"]
        );

        let phone_check = rejection
            .checks
            .iter()
            .find(|c| c.field_name == "phone")
            .unwrap();
        assert!(!phone_check.is_valid);
        assert_eq!(
            phone_check.error_message.as_deref(),
            Some("Please enter a valid phone number; Invalid phone format")
        );
    }

    #[test]
    fn passport_step_rejects_expired_date() {
        let data = obj(json!({
            "passportNumber": "X1234567",
            "passportCountry": "BR",
            "passportExpiryDate": "2024-01-01"
        }));
        let rejection = OnboardingStep::Passport.validate(&data, today()).unwrap_err();
        assert_eq!(
            rejection.error.errors["passportExpiryDate"],
            vec!["Passport must not be expired"]
        );
        assert_eq!(rejection.error.errors.len(), 1);
    }

    #[test]
    fn passport_expiring_today_is_expired() {
        let data = obj(json!({
            "passportNumber": "X1234567",
            "passportCountry": "BR",
            "passportExpiryDate": "2026-03-15"
        }));
        assert!(OnboardingStep::Passport.validate(&data, today()).is_err());
    }

    #[test]
    fn passport_step_accepts_future_date_and_optional_image() {
        let data = obj(json!({
            "passportNumber": "X1234567",
            "passportCountry": "BR",
            "passportExpiryDate": "2031-06-30T00:00:00Z",
            "passportImageUrl": "https://cdn.example.com/p.jpg"
        }));
        let step = OnboardingStep::Passport.validate(&data, today()).unwrap();
        let mut app = OnboardingApplication::new("s");
        step.data.apply(&mut app);
        assert_eq!(app.passport_expiry_date, NaiveDate::from_ymd_opt(2031, 6, 30));
        assert_eq!(app.passport_image_url.as_deref(), Some("https://cdn.example.com/p.jpg"));
    }

    #[test]
    fn unparsable_expiry_is_rejected() {
        let data = obj(json!({
            "passportNumber": "X1234567",
            "passportCountry": "BR",
            "passportExpiryDate": "next year"
        }));
        let rejection = OnboardingStep::Passport.validate(&data, today()).unwrap_err();
        assert!(rejection.error.errors.contains_key("passportExpiryDate"));
    }

    #[test]
    fn address_step_minimums() {
        let data = obj(json!({
            "streetAddress": "1 A",
            "city": "X",
            "state": "CA",
            "zipCode": "94",
            "country": "US"
        }));
        let errors = OnboardingStep::Address.validate(&data, today()).unwrap_err().error.errors;
        assert_eq!(errors.len(), 3);
        assert!(errors.contains_key("streetAddress"));
        assert!(errors.contains_key("city"));
        assert!(errors.contains_key("zipCode"));
    }

    #[test]
    fn business_step_rejects_unknown_type() {
        let data = obj(json!({
            "businessName": "Acme",
            "businessType": "gmbh",
            "businessDescription": "Imports specialty coffee",
            "businessIndustry": "Retail",
            "estimatedRevenue": "0-50k"
        }));
        let errors = OnboardingStep::Business.validate(&data, today()).unwrap_err().error.errors;
        assert_eq!(errors["businessType"], vec!["Please select a business type"]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn business_step_applies_fields() {
        let data = obj(json!({
            "businessName": "Acme Imports",
            "businessType": "sole_proprietorship",
            "businessDescription": "Imports specialty coffee",
            "businessIndustry": "Retail",
            "estimatedRevenue": "0-50k"
        }));
        let step = OnboardingStep::Business.validate(&data, today()).unwrap();
        let mut app = OnboardingApplication::new("s");
        step.data.apply(&mut app);
        assert_eq!(app.business_type, Some(BusinessType::SoleProprietorship));
        assert!(OnboardingStep::Business.missing_fields(&app).is_empty());
        assert_eq!(OnboardingStep::Address.missing_fields(&app).len(), 5);
    }
}
