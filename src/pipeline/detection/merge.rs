use std::collections::HashMap;

use crate::models::FieldMatch;

/// Combine several detector passes into one entry per type, summing counts.
///
/// Output order is the order in which each type first appears across the
/// inputs. The category of the first occurrence is kept.
pub fn merge_results<I>(passes: I) -> Vec<FieldMatch>
where
    I: IntoIterator<Item = Vec<FieldMatch>>,
{
    let mut merged: Vec<FieldMatch> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for pass in passes {
        for m in pass {
            match index.get(&m.type_name) {
                Some(&i) => merged[i].count += m.count,
                None => {
                    index.insert(m.type_name.clone(), merged.len());
                    merged.push(m);
                }
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn fm(type_name: &str, category: Category, count: usize) -> FieldMatch {
        FieldMatch {
            type_name: type_name.into(),
            category,
            count,
        }
    }

    fn counts(matches: &[FieldMatch]) -> Vec<(String, usize)> {
        let mut out: Vec<_> = matches.iter().map(|m| (m.type_name.clone(), m.count)).collect();
        out.sort();
        out
    }

    #[test]
    fn sums_duplicate_types() {
        let merged = merge_results([
            vec![fm("SSN", Category::Pii, 1), fm("CREDIT_CARD", Category::Pci, 2)],
            vec![fm("SSN", Category::Pii, 3)],
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], fm("SSN", Category::Pii, 4));
        assert_eq!(merged[1], fm("CREDIT_CARD", Category::Pci, 2));
    }

    #[test]
    fn keeps_first_occurrence_order() {
        let merged = merge_results([
            vec![fm("MEDICAL_RECORD", Category::Phi, 1)],
            vec![fm("PAN_CARD", Category::Pii, 1), fm("MEDICAL_RECORD", Category::Phi, 1)],
            vec![fm("SSN", Category::Pii, 1)],
        ]);
        let names: Vec<_> = merged.iter().map(|m| m.type_name.as_str()).collect();
        assert_eq!(names, vec!["MEDICAL_RECORD", "PAN_CARD", "SSN"]);
    }

    #[test]
    fn empty_inputs_merge_to_empty() {
        assert!(merge_results(Vec::<Vec<FieldMatch>>::new()).is_empty());
        assert!(merge_results([vec![], vec![]]).is_empty());
    }

    #[test]
    fn merge_is_partition_invariant() {
        let a = vec![fm("SSN", Category::Pii, 1), fm("PAN_CARD", Category::Pii, 2)];
        let b = vec![fm("CREDIT_CARD", Category::Pci, 5), fm("SSN", Category::Pii, 4)];
        let c = vec![fm("PAN_CARD", Category::Pii, 1), fm("HEALTH_INSURANCE", Category::Phi, 1)];

        let left = merge_results([merge_results([a.clone(), b.clone()]), c.clone()]);
        let right = merge_results([a.clone(), merge_results([b.clone(), c.clone()])]);
        let swapped = merge_results([c, b, a]);

        assert_eq!(counts(&left), counts(&right));
        assert_eq!(counts(&left), counts(&swapped));
        assert_eq!(
            counts(&left),
            vec![
                ("CREDIT_CARD".to_string(), 5),
                ("HEALTH_INSURANCE".to_string(), 1),
                ("PAN_CARD".to_string(), 3),
                ("SSN".to_string(), 5),
            ]
        );
    }

    #[test]
    fn merge_never_invents_categories() {
        let merged = merge_results([
            vec![fm("SSN", Category::Pii, 1)],
            vec![fm("MEDICAL_RECORD", Category::Phi, 1)],
        ]);
        assert!(merged
            .iter()
            .all(|m| matches!(m.category, Category::Pii | Category::Phi)));
    }
}
