/*!

This is the long-form manual for `majority_judgment` and `mjpoll`.

## Majority judgment

Every participant gives one grade to every choice. Grades come from a fixed scale,
ordered from the worst to the best, for example:

```text
Nul, Bof, Okay, Bien, Top
```

Internally a grade is a rank: `1` for the worst grade and `K` for the best one.

For every choice, the algorithm counts how many participants gave each rank. With the
counts `c[1..K]` and the cumulative counts `C[r] = c[1] + ... + c[r]`, the total number of
ballots is `N = C[K]`. The **majority grade** is the smallest rank `r` such that
`C[r] >= N / 2`. When exactly half of the ballots are below a grade boundary, the lower
grade is kept.

| counts            | cumulative        | N | majority grade |
|-------------------|-------------------|---|----------------|
| `[1, 3, 2, 1, 1]` | `[1, 4, 6, 7, 8]` | 8 | 2              |
| `[4, 0, 0, 1, 1]` | `[4, 4, 4, 5, 6]` | 6 | 1              |

The report also gives the median (the statistical median of all the ranks, which may end
in `.5`) and the mean of the ranks. A choice that nobody graded has no majority grade:
its result holds `InsufficientData` and the other choices are still ranked.

## Ranking and ties

Choices are ranked by majority grade, best first. Two tie-break modes are available:

* `majorityJudgment` (default): remove one instance of the majority grade from both
  choices and compare the new majority grades, until they differ. This is the same as
  comparing the *majority values* (the successive majority grades) lexicographically.
  When the choices were not graded by the same number of participants, for example
  because of blank cells, every comparison stops after as many steps as the least graded
  choice has grades. Two choices still equal at that point are tied, so a choice graded
  `[0, 0, 1, 0, 0]` and another graded `[0, 0, 2, 0, 0]` share the same position.
* `useChoiceOrder`: choices with the same majority grade keep the order of the poll and
  share the same position.

## Input format

The command line reads a CSV file. The header holds the choice labels, every following
row is one participant:

```text
Q1,Q2,Q3    Q1,Q2,Q3
3,3,3       C,C,C
2,4,1       D,B,E
5,5,1       A,A,E
1,2,2       E,D,D
```

With `--values-type int` (the default) the cells are 1-based ranks, with
`--values-type str` they are grade labels. Values outside the scale produce a warning and
are not counted. With `--skip-rows-out-of-scale` the whole row is dropped instead. The
option `--ignore-first-column` drops a leading column, for example a participant id.

## Configuration

All the options of the command line may also be given in a JSON file with `--config`:

```text
{
  "title": "Restaurants",
  "grades": ["Too bad", "Bad", "Okay", "Good", "Very good"],
  "valuesType": "str",
  "ignoreFirstColumn": false,
  "skipRowsOutOfScale": false,
  "tiebreakMode": "majorityJudgment",
  "responses": "complete",
  "csvPath": "resto.csv",
  "outputPath": "resto_summary.json"
}
```

When `grades` is missing, `lang` (`en` or `fr`) selects a five-level Likert scale.
`valuesType` defaults to `int`. `responses` (`complete` or `validatedOnly`) only applies to
live polls: it selects the sessions counted in the report.
Options given on the command line take precedence over the file.

*/
