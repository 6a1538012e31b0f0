/// Built-in service catalog
///
/// The service offerings registered at startup. Stage content (forms, AI
/// analysis, reports) lives with the renderers; only ordering, ownership and
/// the confirmation field each stage must hand back are declared here.

use crate::workflow::types::{ServiceKind, WorkflowDefinition};

/// Owner of sourcing, manufacturing and market-entry work
pub const TRADE_SPECIALIST: &str = "trade_specialist";
/// Owner of certificates, classification and compliance review
pub const COMPLIANCE_SPECIALIST: &str = "compliance_specialist";

pub fn builtin_definitions() -> Vec<(ServiceKind, WorkflowDefinition)> {
    vec![
        (
            "usmca_certificate".into(),
            WorkflowDefinition::new(
                "USMCA Certificate Generation",
                vec!["Data Review", "Certificate Generation"],
            )
            .assign_all(COMPLIANCE_SPECIALIST)
            .require(1, "dataConfirmed")
            .require(2, "certificateGenerated"),
        ),
        (
            "hs_classification".into(),
            WorkflowDefinition::new(
                "HS Classification Review",
                vec!["Product Review", "Expert Validation"],
            )
            .assign_all(COMPLIANCE_SPECIALIST)
            .require(1, "productReviewed")
            .require(2, "classificationValidated"),
        ),
        (
            "crisis_response".into(),
            WorkflowDefinition::new(
                "Crisis Response Analysis",
                vec!["Crisis Description", "Impact Analysis", "Action Plan"],
            )
            .assign_all(COMPLIANCE_SPECIALIST)
            .require(1, "crisisDescribed")
            .require(2, "analysisComplete")
            .require(3, "actionPlanCreated"),
        ),
        (
            "supplier_sourcing".into(),
            WorkflowDefinition::new(
                "Supplier Sourcing Research",
                vec![
                    "Sourcing Requirements",
                    "AI Supplier Discovery",
                    "Network Validation",
                ],
            )
            .assign_all(TRADE_SPECIALIST)
            .require(1, "requirementsCollected")
            .require(2, "suppliersFound")
            .require(3, "validationComplete"),
        ),
        (
            "manufacturing_feasibility".into(),
            WorkflowDefinition::new(
                "Manufacturing Feasibility Analysis",
                vec!["Manufacturing Context", "AI Analysis", "Recommendation"],
            )
            .assign_all(TRADE_SPECIALIST)
            .require(1, "contextCollected")
            .require(2, "analysisComplete")
            .require(3, "recommendationComplete"),
        ),
        (
            "market_entry".into(),
            WorkflowDefinition::new(
                "Market Entry Strategy",
                vec!["Market Goals", "Market Analysis", "Strategy"],
            )
            .assign_all(TRADE_SPECIALIST)
            .require(1, "goalsCollected")
            .require(2, "analysisComplete")
            .require(3, "strategyComplete"),
        ),
        (
            // Stages 3 and 4 are reviewed by both specialists; the trade
            // specialist is the one who advances them.
            "trade_health_check".into(),
            WorkflowDefinition::new(
                "Trade Health Check Assessment",
                vec!["Client Intake", "Doc Review", "AI Analysis", "Report"],
            )
            .assign(1, TRADE_SPECIALIST)
            .assign(2, COMPLIANCE_SPECIALIST)
            .assign(3, TRADE_SPECIALIST)
            .assign(4, TRADE_SPECIALIST)
            .with_default(TRADE_SPECIALIST, COMPLIANCE_SPECIALIST),
        ),
    ]
}
